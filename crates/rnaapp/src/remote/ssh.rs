use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};

use ssh2::{ExtendedData, Session};

use super::{ConnectParams, Connector, RemoteOutput, RemoteShell};
use crate::error::{Error, Result};
use crate::log_sanitize::sanitize_remote_output;

/// Password-authenticated SSH sessions via libssh2.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

pub struct SshShell {
    session: Session,
    target: String,
}

impl Connector for SshConnector {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn RemoteShell>> {
        let target = format!("{}:{}", params.host, params.port);
        let addr = (params.host.as_str(), params.port)
            .to_socket_addrs()
            .map_err(|e| Error::msg(format!("failed to resolve {target}: {e}")))?
            .next()
            .ok_or_else(|| Error::msg(format!("no address found for {target}")))?;

        tracing::debug!(%target, user = %params.user, "connecting");
        let tcp = TcpStream::connect_timeout(&addr, params.timeout)
            .map_err(|e| Error::msg(format!("failed to connect to {target}: {e}")))?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(params.timeout.as_millis().min(u32::MAX as u128) as u32);
        session
            .handshake()
            .map_err(|e| Error::msg(format!("ssh handshake with {target} failed: {}", e.message())))?;
        session
            .userauth_password(&params.user, &params.password)
            .map_err(|e| {
                Error::msg(format!(
                    "authentication as '{}' on {target} failed: {}",
                    params.user,
                    e.message()
                ))
            })?;
        if !session.authenticated() {
            return Err(Error::msg(format!(
                "authentication as '{}' on {target} failed",
                params.user
            )));
        }
        // The submit command itself returns immediately; only the connection
        // setup is bounded by the timeout.
        session.set_timeout(0);

        tracing::info!(%target, "connected");
        Ok(Box::new(SshShell { session, target }))
    }
}

impl RemoteShell for SshShell {
    fn run(&mut self, cwd: &str, command: &str, echo: bool) -> Result<RemoteOutput> {
        let full = format!("cd {cwd} && {command}");
        if echo {
            tracing::info!(target_host = %self.target, "[{cwd}] {command}");
        }

        let mut channel = self.session.channel_session()?;
        // A single stream: stderr can't fill its window while stdout is drained.
        channel.handle_extended_data(ExtendedData::Merge)?;
        channel.exec(&full)?;

        let mut output = String::new();
        channel.read_to_string(&mut output)?;
        channel.wait_close()?;
        let exit_status = channel.exit_status()?;

        for line in sanitize_remote_output(&output) {
            tracing::info!("remote: {line}");
        }

        Ok(RemoteOutput {
            exit_status,
            output,
        })
    }

    fn close(&mut self) -> Result<()> {
        tracing::debug!(target_host = %self.target, "disconnecting");
        self.session.disconnect(None, "submit finished", None)?;
        Ok(())
    }
}
