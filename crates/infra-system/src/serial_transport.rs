// Serial modem transport
// reason: serialport for the modem's tty; reads only what is already buffered
use async_trait::async_trait;
use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

use smsgw_core::port::{ModemTransport, TransportError};

/// Blocking-call bound for a single read or write (ADR: No magic values)
const SERIAL_IO_TIMEOUT: Duration = Duration::from_secs(1);

/// Exclusive handle on the modem's serial device, 8N1 without flow control
pub struct SerialTransport {
    port_name: String,
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let mut builder = serialport::new(port_name, baud_rate).timeout(SERIAL_IO_TIMEOUT);
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None)
                .flow_control(serialport::FlowControl::None);
        }
        let port = builder.open().map_err(|e| TransportError::Open {
            port: port_name.to_string(),
            reason: e.to_string(),
        })?;

        debug!(port = %port_name, baud_rate, "Opened serial port");
        Ok(Self {
            port_name: port_name.to_string(),
            port,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl ModemTransport for SerialTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = &mut self.port;
        off_worker(|| port.write_all(bytes).and_then(|_| port.flush()))
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        let available = self
            .port
            .bytes_to_read()
            .map_err(|e| TransportError::Read(e.to_string()))? as usize;
        if available == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; available];
        let port = &mut self.port;
        let read = off_worker(|| port.read(&mut buffer))
            .map_err(|e| TransportError::Read(e.to_string()))?;
        buffer.truncate(read);
        Ok(buffer)
    }

    async fn clear_input(&mut self) -> Result<(), TransportError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::Read(e.to_string()))
    }
}

/// Run a blocking serial call without stalling other tasks on this worker
///
/// A current-thread runtime has no other worker to hand tasks to, so the call
/// runs in place there.
fn off_worker<R>(call: impl FnOnce() -> R) -> R {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(call)
        }
        _ => call(),
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        debug!(port = %self.port_name, "Closing serial port");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_fails() {
        let err = SerialTransport::open("/dev/does-not-exist-smsgw", 115_200)
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Open { ref port, .. } if port == "/dev/does-not-exist-smsgw"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_call_on_multi_thread_runtime() {
        let other = tokio::spawn(async { 7 });
        off_worker(|| std::thread::sleep(Duration::from_millis(50)));
        assert_eq!(other.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_blocking_call_on_current_thread_runtime() {
        assert_eq!(off_worker(|| 42), 42);
    }

    #[test]
    fn test_blocking_call_outside_runtime() {
        assert_eq!(off_worker(|| "done"), "done");
    }
}
