//! services/web/src/bin/openapi.rs
//!
//! Writes the OpenAPI document for the HTTP endpoints to `openapi.json`.

use utoipa::OpenApi;
use web_lib::web::ApiDoc;

fn generate_spec(
    api_doc: utoipa::openapi::OpenApi,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, api_doc.to_pretty_json()?)?;
    println!("OpenAPI document written to {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "openapi.json".to_string());
    generate_spec(ApiDoc::openapi(), &path)
}
