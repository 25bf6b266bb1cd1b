use crate::core::config::InstallerConfig;
use crate::core::http::ReqwestTransport;
use crate::core::resolver::LinkResolver;
use crate::error::Result;

/// Print the archive an install would download, without downloading it.
pub fn show_latest(config: &InstallerConfig) -> Result<bool> {
    println!("Checking {}...", config.page_url);

    let transport = ReqwestTransport::new(&config.user_agent, config.connect_timeout())?;
    let patterns = config.link_patterns()?;

    match LinkResolver::new(&transport).resolve(&config.page_url, &patterns)? {
        Some(link) => {
            println!("Latest version: {}", link.version);
            println!("  page link: {}", link.source);
            println!("  download:  {}", link.url);
            Ok(true)
        }
        None => {
            println!("⚠️  No link matching '{}' was found.", patterns.relative.as_str());
            Ok(false)
        }
    }
}
