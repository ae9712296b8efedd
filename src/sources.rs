use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::traits::ProviderRegistry;

/// Status of one provider in the resolution chain.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub priority: usize,
    pub name: String,
    pub description: String,
    pub configured: bool,
}

pub fn source_statuses(registry: &ProviderRegistry) -> Vec<SourceStatus> {
    registry
        .providers()
        .iter()
        .enumerate()
        .map(|(i, p)| SourceStatus {
            priority: i + 1,
            name: p.name().to_string(),
            description: p.description().to_string(),
            configured: p.is_configured(),
        })
        .collect()
}

pub fn list_sources(config: &Config) -> Result<()> {
    let registry = ProviderRegistry::from_config(config)?;

    println!("{:<4} {:<10} {:<16} DESCRIPTION", "#", "PROVIDER", "STATUS");
    for s in source_statuses(&registry) {
        let status = if s.configured {
            "OK"
        } else if s.name == "apify" {
            // the only provider that needs a credential
            "NO TOKEN"
        } else {
            "NOT CONFIGURED"
        };
        println!(
            "{:<4} {:<10} {:<16} {}",
            s.priority, s.name, status, s.description
        );
    }

    Ok(())
}
