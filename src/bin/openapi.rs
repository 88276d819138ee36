use anyhow::Result;

// Prints the broker document, or the legacy one with `--legacy`.
fn main() -> Result<()> {
    let doc = if std::env::args().any(|arg| arg == "--legacy") {
        sesame::api::openapi::legacy_openapi()
    } else {
        sesame::api::openapi::openapi()
    };
    let json = serde_json::to_string_pretty(&doc)?;
    println!("{json}");
    Ok(())
}
