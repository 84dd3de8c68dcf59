use clap::Parser;

#[derive(Parser)]
#[command(name = "grelay")]
pub(crate) struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    pub(crate) host: String,
    #[arg(long, default_value_t = 8788)]
    pub(crate) port: u16,
    /// Database DSN; defaults to a SQLite file under the data dir.
    #[arg(long, default_value = "")]
    pub(crate) dsn: String,
    #[arg(long, default_value = "")]
    pub(crate) data_dir: String,
    /// Downstream API key bootstrapped at startup.
    #[arg(long, default_value = "pwd")]
    pub(crate) api_key: String,
    /// Upstream credential. When unset, generate calls fail with a
    /// configuration error instead of reaching upstream.
    #[arg(long, env = "GEMINI_API_KEY")]
    pub(crate) gemini_api_key: Option<String>,
    #[arg(long, env = "GRELAY_MODEL", default_value = "gemini-2.5-flash")]
    pub(crate) model: String,
    #[arg(
        long,
        env = "GRELAY_UPSTREAM_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub(crate) upstream_base_url: String,
    #[arg(long, default_value_t = 5)]
    pub(crate) connect_timeout_secs: u64,
    #[arg(long, default_value_t = 120)]
    pub(crate) request_timeout_secs: u64,
}
