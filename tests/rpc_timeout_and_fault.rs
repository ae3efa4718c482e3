// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end RPC failure modes (§8 scenarios 3 and 4): a call past its
//! deadline raises `IoTimeout` without wedging the client for a later,
//! well-behaved call on the same connection; a method that throws
//! `RemoteException` delivers a fault with matching `rc`/`text` to an
//! asynchronous `begin_with` callback.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use conduit_rt::rpc::binary_wire::BinaryWire;
use conduit_rt::rpc::client::RemoteClient;
use conduit_rt::rpc::exception::RemoteException;
use conduit_rt::rpc::registry::typed;
use conduit_rt::rpc::server::ServiceServer;
use conduit_rt::rpc::{RemoteProcedure, RpcError};
use conduit_rt::{Error, Reactor};

#[test]
fn timeout_does_not_poison_a_later_call_on_the_same_client() {
    let reactor = Reactor::new().unwrap();
    let server = ServiceServer::bind(&reactor, "127.0.0.1:0", || Box::new(BinaryWire::new())).unwrap();
    server.register_method("", "echo", typed(|(n,): (i64,)| -> Result<i64, RemoteException> { Ok(n) }));
    let port = server.local_port().unwrap();

    // A second listener that never accepts stands in for a server that
    // never answers, forcing the first call to time out without a real
    // peer. The subsequent call goes to the real, responsive server.
    let stalled_listener = conduit_rt::transport::TcpListener::bind("127.0.0.1:0", 1).unwrap();
    let stalled_port = stalled_listener.local_port().unwrap();

    let client = RemoteClient::connect(&reactor, ("127.0.0.1", stalled_port), Box::new(BinaryWire::new())).unwrap();
    client.set_default_timeout(Duration::from_millis(100));
    let stalled_procedure: RemoteProcedure<i64, (i64,)> = RemoteProcedure::new(client, "echo");
    let err = stalled_procedure.call((1,)).unwrap_err();
    assert!(matches!(err, RpcError::Transport(Error::IoTimeout)));

    let live_client = RemoteClient::connect(&reactor, ("127.0.0.1", port), Box::new(BinaryWire::new())).unwrap();
    server.step(Duration::from_millis(50)).unwrap();
    let live_procedure: RemoteProcedure<i64, (i64,)> = RemoteProcedure::new(live_client, "echo");
    assert_eq!(live_procedure.call((7,)).unwrap(), 7);
}

#[test]
fn a_thrown_remote_exception_reaches_an_async_callback_with_matching_rc_and_text() {
    let reactor = Reactor::new().unwrap();
    let server = ServiceServer::bind(&reactor, "127.0.0.1:0", || Box::new(BinaryWire::new())).unwrap();
    server.register_method(
        "",
        "explode",
        typed(|_: ()| -> Result<i64, RemoteException> { Err(RemoteException::with_code("Fault", 7)) }),
    );
    let port = server.local_port().unwrap();

    let client = RemoteClient::connect(&reactor, ("127.0.0.1", port), Box::new(BinaryWire::new())).unwrap();
    server.step(Duration::from_millis(50)).unwrap();

    let procedure: RemoteProcedure<i64, ()> = RemoteProcedure::new(client.clone(), "explode");
    let observed: Rc<RefCell<Option<RpcError>>> = Rc::new(RefCell::new(None));
    let observed_for_callback = observed.clone();
    procedure
        .begin_with((), move |result| {
            let err = result.get().unwrap_err();
            *observed_for_callback.borrow_mut() = Some(err);
        })
        .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while observed.borrow().is_none() && std::time::Instant::now() < deadline {
        reactor.wait(Duration::from_millis(20)).unwrap();
    }

    match observed.borrow().take().expect("callback never fired") {
        RpcError::Remote(e) => {
            assert_eq!(e.rc(), 7);
            assert_eq!(e.text(), "Fault");
        }
        other => panic!("expected RpcError::Remote, got {other:?}"),
    }
}
