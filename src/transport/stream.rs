// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plain TCP stream transport (§6): the non-HTTP wire forms run directly
//! over a connected socket adopted as an [`IoDevice`], grounded the same
//! way `io::pipe`/`io::file` adopt an existing descriptor via
//! `IoDeviceImpl::open_fd` — every byte-stream endpoint in this crate is
//! "a raw fd wrapped in `IoDeviceImpl`", sockets included, rather than a
//! second, parallel `mio::net::TcpStream`-based I/O path.

use std::mem;
use std::net::{SocketAddr, ToSocketAddrs};
use std::os::unix::io::RawFd;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::io::{IoDevice, IoDeviceImpl};

fn resolve_one(addr: impl ToSocketAddrs) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(Error::Io)?
        .next()
        .ok_or_else(|| Error::System("no addresses resolved".into()))
}

fn socket_addr_to_raw(addr: SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    // SAFETY: a zeroed `sockaddr_storage` is a valid (if meaningless)
    // instance of that type; we fill in the fields that matter below.
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(v4) => {
            let sin = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: v4.port().to_be(),
                sin_addr: libc::in_addr {
                    s_addr: u32::from_ne_bytes(v4.ip().octets()),
                },
                sin_zero: [0; 8],
            };
            // SAFETY: `storage` has at least `sizeof(sockaddr_in)` bytes.
            unsafe { std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in, sin) };
            mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            let sin6 = libc::sockaddr_in6 {
                sin6_family: libc::AF_INET6 as libc::sa_family_t,
                sin6_port: v6.port().to_be(),
                sin6_flowinfo: 0,
                sin6_addr: libc::in6_addr {
                    s6_addr: v6.ip().octets(),
                },
                sin6_scope_id: 0,
            };
            // SAFETY: `storage` has at least `sizeof(sockaddr_in6)` bytes.
            unsafe { std::ptr::write(&mut storage as *mut _ as *mut libc::sockaddr_in6, sin6) };
            mem::size_of::<libc::sockaddr_in6>()
        }
    };
    (storage, len as libc::socklen_t)
}

fn last_os_error() -> Error {
    Error::Io(std::io::Error::last_os_error())
}

fn set_nodelay(fd: RawFd) {
    let one: libc::c_int = 1;
    // SAFETY: fd is a valid, open stream socket; `one` outlives the call.
    unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_NODELAY,
            &one as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

/// A connected TCP byte stream, adopted as an [`IoDevice`].
pub struct TcpStream;

impl TcpStream {
    /// Synchronously `connect()` to `addr`, then adopt the resulting
    /// descriptor as an async-mode `IoDevice` (§4.H: `RemoteClient::connect`).
    pub fn connect(addr: impl ToSocketAddrs, inherit: bool) -> Result<Rc<IoDevice>> {
        let addr = resolve_one(addr)?;
        let domain = if addr.is_ipv6() { libc::AF_INET6 } else { libc::AF_INET };
        // SAFETY: domain/type/protocol are all valid, constant arguments.
        let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(last_os_error());
        }
        let (storage, len) = socket_addr_to_raw(addr);
        // SAFETY: `storage` holds a valid sockaddr of at least `len` bytes.
        let rc = unsafe { libc::connect(fd, &storage as *const _ as *const libc::sockaddr, len) };
        if rc != 0 {
            let err = last_os_error();
            // SAFETY: fd was just opened above and not yet adopted.
            unsafe { libc::close(fd) };
            return Err(err);
        }
        Self::adopt(fd, inherit)
    }

    /// Adopt an already-connected descriptor (e.g. one returned by
    /// [`TcpListener::try_accept`]) as an async-mode `IoDevice`.
    pub fn adopt(fd: RawFd, inherit: bool) -> Result<Rc<IoDevice>> {
        set_nodelay(fd);
        let imp = IoDeviceImpl::open_fd(fd, true, inherit)?;
        Ok(IoDevice::new(imp))
    }
}

/// A listening TCP socket. Deliberately not a `Selectable`: a listener
/// only ever produces acceptable-connection events, never the
/// readable/writable byte-stream events `Selectable` models, so
/// `ServiceServer` polls it directly with `try_accept` rather than
/// registering it on a `Reactor`.
pub struct TcpListener {
    fd: RawFd,
}

impl TcpListener {
    pub fn bind(addr: impl ToSocketAddrs, backlog: i32) -> Result<Self> {
        let addr = resolve_one(addr)?;
        let domain = if addr.is_ipv6() { libc::AF_INET6 } else { libc::AF_INET };
        // SAFETY: domain/type/protocol are all valid, constant arguments.
        let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(last_os_error());
        }
        let one: libc::c_int = 1;
        // SAFETY: fd is a valid, open socket; `one` outlives the call.
        unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &one as *const _ as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            );
        }
        let (storage, len) = socket_addr_to_raw(addr);
        // SAFETY: `storage` holds a valid sockaddr of at least `len` bytes.
        let rc = unsafe { libc::bind(fd, &storage as *const _ as *const libc::sockaddr, len) };
        if rc != 0 {
            let err = last_os_error();
            // SAFETY: fd was just opened above.
            unsafe { libc::close(fd) };
            return Err(err);
        }
        // SAFETY: fd was just bound above.
        let rc = unsafe { libc::listen(fd, backlog) };
        if rc != 0 {
            let err = last_os_error();
            // SAFETY: fd was just bound above.
            unsafe { libc::close(fd) };
            return Err(err);
        }
        // SAFETY: fd is a valid, open descriptor; F_GETFL/F_SETFL never
        // invalidate it.
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL, 0);
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
        Ok(Self { fd })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd
    }

    /// Accept a pending connection, if any. Non-blocking: `EAGAIN`
    /// reports `Ok(None)` rather than waiting, since the listener is
    /// driven by the server's own poll/timer loop, not a `Selectable`
    /// readiness event.
    pub fn try_accept(&self, inherit: bool) -> Result<Option<Rc<IoDevice>>> {
        // SAFETY: fd is a valid, listening, non-blocking socket.
        let fd = unsafe { libc::accept(self.fd, std::ptr::null_mut(), std::ptr::null_mut()) };
        if fd < 0 {
            let err = std::io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EWOULDBLOCK) => Ok(None),
                _ => Err(Error::Io(err)),
            };
        }
        Ok(Some(TcpStream::adopt(fd, inherit)?))
    }

    pub fn local_port(&self) -> Result<u16> {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        // SAFETY: `storage`/`len` are valid out-params sized for any sockaddr.
        let rc = unsafe {
            libc::getsockname(self.fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut len)
        };
        if rc != 0 {
            return Err(last_os_error());
        }
        let port = match storage.ss_family as i32 {
            libc::AF_INET => {
                // SAFETY: the OS just filled this in as an AF_INET address.
                let sin: libc::sockaddr_in = unsafe { mem::transmute_copy(&storage) };
                u16::from_be(sin.sin_port)
            }
            _ => {
                // SAFETY: the OS just filled this in as an AF_INET6 address.
                let sin6: libc::sockaddr_in6 = unsafe { mem::transmute_copy(&storage) };
                u16::from_be(sin6.sin6_port)
            }
        };
        Ok(port)
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        // SAFETY: fd is owned exclusively by this struct and still open.
        unsafe {
            libc::close(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_to_port_zero_picks_an_ephemeral_port() {
        let listener = TcpListener::bind("127.0.0.1:0", 16).unwrap();
        assert!(listener.local_port().unwrap() > 0);
    }

    #[test]
    fn try_accept_on_an_idle_listener_returns_none() {
        let listener = TcpListener::bind("127.0.0.1:0", 16).unwrap();
        assert!(listener.try_accept(false).unwrap().is_none());
    }

    #[test]
    fn connect_and_accept_establish_a_byte_stream() {
        let listener = TcpListener::bind("127.0.0.1:0", 16).unwrap();
        let port = listener.local_port().unwrap();
        let _client = TcpStream::connect(("127.0.0.1", port), false).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        let mut accepted = None;
        while std::time::Instant::now() < deadline {
            if let Some(device) = listener.try_accept(false).unwrap() {
                accepted = Some(device);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(accepted.is_some());
    }
}
