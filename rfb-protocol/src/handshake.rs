//! RFB 3.8 client handshake.
//!
//! The handshake runs through a fixed sequence of states:
//!
//! version exchange -> security list -> security choice ->
//! (no auth | VNC auth) -> ClientInit -> ServerInit
//!
//! Only protocol 3.8 is spoken: the server's 12-byte version string must be
//! exactly `RFB 003.008\n`, anything else fails immediately. Security
//! selection prefers None (1), then VNC authentication (2); if neither is
//! offered the first advertised type is chosen and the handshake fails with
//! an unsupported-security error after announcing the choice.
//!
//! After choosing None the handshake proceeds straight to ClientInit
//! without reading a SecurityResult word - that matches the deployed
//! servers this client targets.
//!
//! Failure classes are carried in the `ErrorKind` (see crate docs):
//! refusal reasons map to `ConnectionRefused`, a rejected DES response to
//! `PermissionDenied`, everything malformed to `InvalidData`/`Unsupported`.

use crate::auth;
use crate::io::{RfbInStream, RfbOutStream};
use crate::messages::types::{decode_latin1, SECURITY_NONE, SECURITY_VNC_AUTH};
use crate::messages::{ClientInit, ServerInit};
use crate::PROTOCOL_VERSION;
use tokio::io::{AsyncRead, AsyncWrite};

/// What the completed handshake produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeOutcome {
    /// The server's desktop description.
    pub server_init: ServerInit,
    /// Security type that was negotiated (1 = None, 2 = VNC auth).
    pub security_type: u8,
}

/// Run the complete RFB 3.8 client handshake.
///
/// `password` is consulted only when the server requires VNC
/// authentication; a missing password at that point is a
/// `PermissionDenied` error before anything is sent.
pub async fn perform<R, W>(
    input: &mut RfbInStream<R>,
    output: &mut RfbOutStream<W>,
    password: Option<&str>,
) -> std::io::Result<HandshakeOutcome>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    exchange_versions(input, output).await?;
    let security_type = negotiate_security(input, output, password).await?;

    // Always request a shared desktop.
    ClientInit { shared: true }.write_to(output);
    output.flush().await?;

    let server_init = ServerInit::read_from(input).await?;
    tracing::info!(
        "handshake complete: \"{}\" {}x{}, {} bpp",
        server_init.name,
        server_init.width,
        server_init.height,
        server_init.pixel_format.bits_per_pixel()
    );

    Ok(HandshakeOutcome {
        server_init,
        security_type,
    })
}

async fn exchange_versions<R, W>(
    input: &mut RfbInStream<R>,
    output: &mut RfbOutStream<W>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut version = [0u8; 12];
    input.read_exact(&mut version).await?;

    if &version != PROTOCOL_VERSION {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "unsupported protocol version {:?} (only RFB 003.008 is spoken)",
                String::from_utf8_lossy(&version).trim_end()
            ),
        ));
    }

    output.write_bytes(PROTOCOL_VERSION);
    output.flush().await
}

async fn negotiate_security<R, W>(
    input: &mut RfbInStream<R>,
    output: &mut RfbOutStream<W>,
    password: Option<&str>,
) -> std::io::Result<u8>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let count = input.read_u8().await?;
    if count == 0 {
        let reason = read_reason(input).await?;
        return Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            format!("server refused connection: {}", reason),
        ));
    }

    let offered = input.read_exact_vec(count as usize).await?;
    tracing::debug!("server offered security types {:?}", offered);

    let choice = if offered.contains(&SECURITY_NONE) {
        SECURITY_NONE
    } else if offered.contains(&SECURITY_VNC_AUTH) {
        SECURITY_VNC_AUTH
    } else {
        offered[0]
    };

    output.write_u8(choice);
    output.flush().await?;

    match choice {
        SECURITY_NONE => Ok(choice),
        SECURITY_VNC_AUTH => {
            vnc_authenticate(input, output, password).await?;
            Ok(choice)
        }
        other => Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("unsupported security type: {}", other),
        )),
    }
}

async fn vnc_authenticate<R, W>(
    input: &mut RfbInStream<R>,
    output: &mut RfbOutStream<W>,
    password: Option<&str>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let password = password.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "server requires VNC authentication but no password was configured",
        )
    })?;

    let mut challenge = [0u8; 16];
    input.read_exact(&mut challenge).await?;

    let response = auth::challenge_response(password, &challenge);
    output.write_bytes(&response);
    output.flush().await?;

    let status = input.read_u32().await?;
    if status != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "server rejected VNC authentication",
        ));
    }
    Ok(())
}

async fn read_reason<R: AsyncRead + Unpin>(
    input: &mut RfbInStream<R>,
) -> std::io::Result<String> {
    let len = input.read_u32().await? as usize;
    let bytes = input.read_exact_vec(len).await?;
    Ok(decode_latin1(&bytes))
}
