// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end: the same `multiply(Color, Color) -> Color` method, reached
//! through two different wire codecs over real TCP sockets, produces the
//! same result (§8 scenario 2).

use std::time::Duration;

use conduit_rt::rpc::binary_wire::BinaryWire;
use conduit_rt::rpc::client::{RemoteClient, RemoteProcedure};
use conduit_rt::rpc::exception::RemoteException;
use conduit_rt::rpc::jsonrpc::JsonRpcWire;
use conduit_rt::rpc::registry::typed;
use conduit_rt::rpc::server::ServiceServer;
use conduit_rt::value::SerializationInfo;
use conduit_rt::Reactor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Color {
    r: i64,
    g: i64,
    b: i64,
}

impl From<Color> for SerializationInfo {
    fn from(c: Color) -> Self {
        let mut si = SerializationInfo::new_object();
        si.set_type_name("Color");
        *si.add_member("r") = c.r.into();
        *si.add_member("g") = c.g.into();
        *si.add_member("b") = c.b.into();
        si
    }
}

impl TryFrom<&SerializationInfo> for Color {
    type Error = conduit_rt::Error;
    fn try_from(si: &SerializationInfo) -> Result<Self, Self::Error> {
        Ok(Color {
            r: si.get_member("r")?.to_i64()?,
            g: si.get_member("g")?.to_i64()?,
            b: si.get_member("b")?.to_i64()?,
        })
    }
}

fn multiply(a: Color, b: Color) -> Color {
    Color {
        r: a.r * b.r,
        g: a.g * b.g,
        b: a.b * b.b,
    }
}

fn register(server: &ServiceServer) {
    server.register_method(
        "",
        "multiply",
        typed(|(a, b): (Color, Color)| -> Result<Color, RemoteException> { Ok(multiply(a, b)) }),
    );
}

#[test]
fn binary_and_json_transports_agree_on_the_result() {
    let reactor = Reactor::new().unwrap();

    let binary_server = ServiceServer::bind(&reactor, "127.0.0.1:0", || Box::new(BinaryWire::new())).unwrap();
    register(&binary_server);
    let binary_port = binary_server.local_port().unwrap();

    let json_server = ServiceServer::bind(&reactor, "127.0.0.1:0", || Box::new(JsonRpcWire::new())).unwrap();
    register(&json_server);
    let json_port = json_server.local_port().unwrap();

    let binary_client = RemoteClient::connect(&reactor, ("127.0.0.1", binary_port), Box::new(BinaryWire::new())).unwrap();
    let json_client = RemoteClient::connect(&reactor, ("127.0.0.1", json_port), Box::new(JsonRpcWire::new())).unwrap();

    binary_server.step(Duration::from_millis(50)).unwrap();
    json_server.step(Duration::from_millis(50)).unwrap();

    let via_binary: RemoteProcedure<Color, (Color, Color)> = RemoteProcedure::new(binary_client, "multiply");
    let via_json: RemoteProcedure<Color, (Color, Color)> = RemoteProcedure::new(json_client, "multiply");

    let a = Color { r: 2, g: 3, b: 4 };
    let b = Color { r: 3, g: 4, b: 5 };
    let expected = Color { r: 6, g: 12, b: 20 };

    let result_binary = via_binary.call((a, b)).unwrap();
    binary_server.step(Duration::from_millis(50)).unwrap();
    let result_json = via_json.call((a, b)).unwrap();

    assert_eq!(result_binary, expected);
    assert_eq!(result_json, expected);
}
