//! Accept-loop lifecycle: `Server::start` binds and spawns the accept task,
//! `stop` cancels it and closes the listener, `wait` joins it.

use std::sync::Arc;

use pqtun_proto::auth::SignatureVerifier;
use pqtun_relay::Reporter;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::dispatch::handle_connection;
use crate::policy::ProtocolPolicy;

pub struct Server {
    cancel: CancellationToken,
    accept_task: JoinHandle<()>,
    local_addr: std::net::SocketAddr,
}

impl Server {
    /// Binds `config.bind_addr` and spawns the accept loop. Each accepted
    /// connection runs in its own task, driven by [`handle_connection`].
    pub async fn start(
        config: ServerConfig,
        verifier: Arc<dyn SignatureVerifier>,
        policy: Arc<dyn ProtocolPolicy>,
        reporter: Option<Arc<dyn Reporter>>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let cancel = CancellationToken::new();
        let accept_cancel = cancel.clone();

        let accept_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = accept_cancel.cancelled() => {
                        info!("accept loop cancelled");
                        return;
                    }
                    accepted = listener.accept() => {
                        let (stream, remote) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => {
                                error!(error = %e, "accept failed");
                                continue;
                            }
                        };

                        let config = config.clone();
                        let verifier = verifier.clone();
                        let policy = policy.clone();
                        let reporter = reporter.clone();
                        let conn_cancel = accept_cancel.child_token();

                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, remote, &config, verifier, policy, reporter, conn_cancel).await
                            {
                                error!(%remote, error = %e, "connection ended with an error");
                            }
                        });
                    }
                }
            }
        });

        Ok(Self {
            cancel,
            accept_task,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Cancels the accept loop and every in-flight connection's relay.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) {
        let _ = self.accept_task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AllowList;
    use pqtun_proto::auth::{HmacVerifier, PasswordLookup};
    use std::time::Duration;

    struct OneUser;
    impl PasswordLookup for OneUser {
        fn lookup(&self, client_id: &[u8]) -> Option<Vec<u8>> {
            (client_id == b"alice").then(|| b"password".to_vec())
        }
    }

    #[tokio::test]
    async fn start_then_stop_shuts_down_the_accept_loop() {
        let mut config = ServerConfig::default();
        config.bind_addr = "127.0.0.1:0".to_string();

        let verifier: Arc<dyn SignatureVerifier> = Arc::new(HmacVerifier::new(OneUser));
        let policy: Arc<dyn ProtocolPolicy> = Arc::new(AllowList::new(["tcp", "udp"]));

        let server = Server::start(config, verifier, policy, None).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);

        server.stop();
        tokio::time::timeout(Duration::from_secs(1), server.wait()).await.unwrap();
    }
}
