mod server;
pub use server::Server;

mod server_config;
pub use server_config::ServerConfig;

mod handle;
pub use handle::ServerHandle;
