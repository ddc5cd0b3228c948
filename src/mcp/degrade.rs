//! Progressive degradation for auxiliary servers
//!
//! A backend that can only connect its auxiliary servers all at once (the
//! managed client takes one `--mcp-config` at startup) uses this search:
//!
//! 1. Try the full server set
//! 2. With two or more servers, retry leaving out exactly one server at a
//!    time; the first combination that connects wins and the omitted server
//!    is recorded as failed
//! 3. Otherwise connect with no auxiliary servers and record all as failed
//!
//! Only a failure of the zero-server attempt is an error.

use anyhow::Result;
use std::future::Future;

use super::config::AuxServerConfig;
use super::status::AuxServerStatusMap;

/// A connected session plus the servers it actually has
#[derive(Debug)]
pub struct Degraded<T> {
    pub session: T,
    pub active: Vec<AuxServerConfig>,
}

/// Connect, degrading the server set until something works
pub async fn connect_with_degradation<T, F, Fut>(
    servers: &[AuxServerConfig],
    statuses: &AuxServerStatusMap,
    mut attempt: F,
) -> Result<Degraded<T>>
where
    F: FnMut(Vec<AuxServerConfig>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if servers.is_empty() {
        let session = attempt(Vec::new()).await?;
        return Ok(Degraded {
            session,
            active: Vec::new(),
        });
    }

    let full_error = match attempt(servers.to_vec()).await {
        Ok(session) => {
            for server in servers {
                statuses.mark_connected(&server.name);
            }
            return Ok(Degraded {
                session,
                active: servers.to_vec(),
            });
        }
        Err(e) => e,
    };

    tracing::warn!(
        "[AuxServers] Connecting with all {} servers failed: {:#}",
        servers.len(),
        full_error
    );

    if servers.len() >= 2 {
        for (skip, omitted) in servers.iter().enumerate() {
            let subset: Vec<AuxServerConfig> = servers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, s)| s.clone())
                .collect();

            tracing::info!("[AuxServers] Retrying without '{}'", omitted.name);

            match attempt(subset.clone()).await {
                Ok(session) => {
                    statuses.mark_failed(
                        &omitted.name,
                        format!("connection failed: {:#}", full_error),
                    );
                    for server in &subset {
                        statuses.mark_connected(&server.name);
                    }
                    return Ok(Degraded {
                        session,
                        active: subset,
                    });
                }
                Err(e) => {
                    tracing::debug!(
                        "[AuxServers] Still failing without '{}': {:#}",
                        omitted.name,
                        e
                    );
                }
            }
        }
    }

    tracing::warn!("[AuxServers] Falling back to no auxiliary servers");
    let session = attempt(Vec::new()).await?;
    for server in servers {
        statuses.mark_failed(
            &server.name,
            format!("no working server combination: {:#}", full_error),
        );
    }

    Ok(Degraded {
        session,
        active: Vec::new(),
    })
}
