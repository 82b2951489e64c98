use tl_domain::config::IdentityConfig;
use tl_sessions::IdentityDecoder;

/// Print a `name=value` cookie pair carrying `identity`, encrypted with the
/// configured key, so operators can issue test cookies.
pub fn encode(cfg: &IdentityConfig, identity: &str) -> anyhow::Result<()> {
    if identity.is_empty() {
        anyhow::bail!("identity must not be empty");
    }
    let decoder = IdentityDecoder::from_config(cfg);
    println!("{}={}", decoder.cookie_name(), decoder.encode(identity));
    Ok(())
}
