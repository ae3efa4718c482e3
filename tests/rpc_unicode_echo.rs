// SPDX-License-Identifier: Apache-2.0 OR MIT

//! §8 scenario 5, exercised through the RPC layer rather than bare codec
//! round trips: an `echo` method returns a string carrying a UTF-8 BOM
//! followed by quote/ampersand/angle-bracket characters, bitwise identical,
//! over both the binary and the JSON-RPC wire forms.

use std::time::Duration;

use conduit_rt::rpc::binary_wire::BinaryWire;
use conduit_rt::rpc::client::RemoteClient;
use conduit_rt::rpc::exception::RemoteException;
use conduit_rt::rpc::jsonrpc::JsonRpcWire;
use conduit_rt::rpc::registry::typed;
use conduit_rt::rpc::server::ServiceServer;
use conduit_rt::rpc::RemoteProcedure;
use conduit_rt::Reactor;

const TRICKY: &str = "\u{feff}'\"&<> foo?";

fn register_echo(server: &ServiceServer) {
    server.register_method(
        "",
        "echo",
        typed(|(s,): (String,)| -> Result<String, RemoteException> { Ok(s) }),
    );
}

#[test]
fn the_same_tricky_string_survives_binary_and_json_rpc_unchanged() {
    let reactor = Reactor::new().unwrap();

    let binary_server = ServiceServer::bind(&reactor, "127.0.0.1:0", || Box::new(BinaryWire::new())).unwrap();
    register_echo(&binary_server);
    let binary_port = binary_server.local_port().unwrap();

    let json_server = ServiceServer::bind(&reactor, "127.0.0.1:0", || Box::new(JsonRpcWire::new())).unwrap();
    register_echo(&json_server);
    let json_port = json_server.local_port().unwrap();

    let binary_client = RemoteClient::connect(&reactor, ("127.0.0.1", binary_port), Box::new(BinaryWire::new())).unwrap();
    let json_client = RemoteClient::connect(&reactor, ("127.0.0.1", json_port), Box::new(JsonRpcWire::new())).unwrap();
    binary_server.step(Duration::from_millis(50)).unwrap();
    json_server.step(Duration::from_millis(50)).unwrap();

    let via_binary: RemoteProcedure<String, (String,)> = RemoteProcedure::new(binary_client, "echo");
    let via_json: RemoteProcedure<String, (String,)> = RemoteProcedure::new(json_client, "echo");

    assert_eq!(via_binary.call((TRICKY.to_string(),)).unwrap(), TRICKY);
    binary_server.step(Duration::from_millis(50)).unwrap();
    assert_eq!(via_json.call((TRICKY.to_string(),)).unwrap(), TRICKY);
}
