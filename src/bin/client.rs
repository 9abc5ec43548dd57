use anyhow::{Result, bail};
use tracing::{error, info};
use twirp_lite::CodecKind;
use twirp_lite::client::ClientConfig;
use twirp_prototype::haberdasher::{HaberdasherV1Client, SizeV1};

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

#[tokio::main]
async fn main() -> Result<()> {
    twirp_prototype::init_tracing("info");

    let url = std::env::var("SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    let literal = std::env::var("LITERAL_URLS").is_ok_and(|value| value == "1" || value == "true");
    let codec = match std::env::var("CODEC").as_deref() {
        Ok("json") => CodecKind::Structured,
        Ok("protobuf") | Err(_) => CodecKind::Binary,
        Ok(other) => bail!("unknown CODEC {other:?}, expected \"protobuf\" or \"json\""),
    };

    let config = ClientConfig::new()
        .with_literal_urls(literal)
        .with_codec(codec);
    let client = HaberdasherV1Client::new(&url, reqwest::Client::new(), config)?;

    for inches in [1, 12, 0] {
        match client.make_hat_v1(&SizeV1 { inches }).await {
            Ok(hat) => info!(inches, size = hat.size, "Got a hat"),
            Err(e) => error!(inches, code = %e.code(), meta = ?e.meta(), "{}", e.msg()),
        }
    }

    Ok(())
}
