use super::TunnelConfig;
use crate::error::{Result, VpnError};
use bytes::Bytes;
use log::{debug, error, info};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tun::Device as _;

/// Scratch buffer size for adapter reads
pub const READ_BUFFER_SIZE: usize = 65536;

/// A virtual adapter plus the two loops that pump packets through it
///
/// The adapter is released exactly once, when [`TunnelDevice::close`] has
/// stopped both loops. Any adapter I/O error, including a short write, is
/// fatal: the failing loop raises the shutdown signal, the other loop follows,
/// and the error is reported by `close`. A closed inbound or outbound queue
/// also raises the signal, without an error. Recreating the device is up to
/// the caller.
pub struct TunnelDevice<A = tun::AsyncDevice> {
    name: String,
    debug: bool,
    adapter: Option<A>,
    shutdown: CancellationToken,
    loops: Vec<JoinHandle<Result<()>>>,
}

impl TunnelDevice<tun::AsyncDevice> {
    /// Create the OS adapter described by `config`
    ///
    /// The device shuts down when `parent` is cancelled.
    pub fn new(config: &TunnelConfig, parent: &CancellationToken) -> Result<Self> {
        config.validate()?;

        let mut tun_config = tun::Configuration::default();
        if !config.interface_name.is_empty() {
            tun_config.name(&config.interface_name);
        }
        tun_config
            .address(config.address)
            .netmask(config.netmask)
            .mtu(i32::from(config.mtu))
            .up();

        let device = tun::create_as_async(&tun_config)
            .map_err(|e| VpnError::Device(format!("TUN interface creation failed: {e}")))?;
        let name = device.get_ref().name()?;

        info!(
            "Created TUN interface {} ({}/{}, mtu {})",
            name, config.address, config.netmask, config.mtu
        );
        Ok(Self::with_adapter(device, name, config.debug, parent))
    }
}

impl<A> TunnelDevice<A>
where
    A: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap an already opened adapter
    pub fn with_adapter(
        adapter: A,
        name: impl Into<String>,
        debug: bool,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            debug,
            adapter: Some(adapter),
            shutdown: parent.child_token(),
            loops: Vec::new(),
        }
    }

    /// Start the write loop (`inbound` to adapter) and the read loop (adapter
    /// to `outbound`)
    pub fn run(
        &mut self,
        inbound: mpsc::Receiver<Bytes>,
        outbound: mpsc::Sender<Bytes>,
    ) -> Result<()> {
        let adapter = self.adapter.take().ok_or_else(|| {
            VpnError::InvalidState(format!("TUN interface {} is already running", self.name))
        })?;
        let (reader, writer) = tokio::io::split(adapter);

        self.loops.push(tokio::spawn(write_loop(
            writer,
            inbound,
            self.shutdown.clone(),
            self.name.clone(),
            self.debug,
        )));
        self.loops.push(tokio::spawn(read_loop(
            reader,
            outbound,
            self.shutdown.clone(),
            self.name.clone(),
            self.debug,
        )));

        debug!("TUN interface {} loops started", self.name);
        Ok(())
    }
}

impl<A> TunnelDevice<A> {
    /// OS-assigned adapter name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.loops.iter().any(|handle| !handle.is_finished())
    }

    /// True once shutdown was requested or a loop failed
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token raised on close, on parent cancellation, or on a fatal adapter error
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait until the device shuts down for any reason
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }

    /// Stop both loops and release the adapter
    ///
    /// Returns the first error a loop exited with.
    pub async fn close(mut self) -> Result<()> {
        self.shutdown.cancel();
        drop(self.adapter.take());

        let mut result = Ok(());
        for handle in self.loops.drain(..) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(VpnError::Device(format!("tunnel loop aborted: {e}"))),
            };
            if let Err(e) = outcome {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        info!("Closed TUN interface {}", self.name);
        result
    }
}

impl<A> Drop for TunnelDevice<A> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn fatal(
    shutdown: &CancellationToken,
    name: &str,
    what: &str,
    err: impl std::fmt::Display,
) -> VpnError {
    error!("TUN interface {name} {what} failed: {err}");
    shutdown.cancel();
    VpnError::Device(format!("{name}: {what} failed: {err}"))
}

async fn write_loop<W>(
    mut adapter: W,
    mut inbound: mpsc::Receiver<Bytes>,
    shutdown: CancellationToken,
    name: String,
    debug: bool,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let data = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            data = inbound.recv() => match data {
                Some(data) => data,
                None => {
                    debug!("TUN interface {name} inbound queue closed, shutting down");
                    shutdown.cancel();
                    break;
                }
            },
        };

        let written = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            written = adapter.write(&data) => written,
        };
        match written {
            Ok(n) if n == data.len() => {
                if debug {
                    debug!("tun write: {n}");
                }
            }
            Ok(n) => {
                let short = format!("short write of {n}/{} bytes", data.len());
                return Err(fatal(&shutdown, &name, "write", short));
            }
            Err(e) => return Err(fatal(&shutdown, &name, "write", e)),
        }
    }
    Ok(())
}

async fn read_loop<R>(
    mut adapter: R,
    outbound: mpsc::Sender<Bytes>,
    shutdown: CancellationToken,
    name: String,
    debug: bool,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            read = adapter.read(&mut buf) => read,
        };
        let n = match read {
            Ok(0) => return Err(fatal(&shutdown, &name, "read", "end of stream")),
            Ok(n) => n,
            Err(e) => return Err(fatal(&shutdown, &name, "read", e)),
        };
        if debug {
            debug!("tun read: {n}");
        }

        // buf is reused on the next read, the consumer keeps its own copy
        let packet = Bytes::copy_from_slice(&buf[..n]);
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            sent = outbound.send(packet) => {
                if sent.is_err() {
                    debug!("TUN interface {name} outbound queue closed, shutting down");
                    shutdown.cancel();
                    break;
                }
            }
        }
    }
    Ok(())
}
