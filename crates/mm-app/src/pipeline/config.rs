use std::env;

/// Base URLs for the two backend services. Defaults match the development
/// deployment; override via environment or a `.env` file.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub mesh_url: String,
    pub material_url: String,
}

impl BackendConfig {
    pub fn load() -> Self {
        // Optional .env; absence is fine.
        let _ = dotenvy::dotenv();

        let mesh_url =
            env::var("MM_MESH_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        let material_url =
            env::var("MM_MATERIAL_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        log::info!("Backends: mesh={mesh_url} material={material_url}");

        Self {
            mesh_url,
            material_url,
        }
    }
}
