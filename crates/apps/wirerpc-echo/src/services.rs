use serde::{Deserialize, Serialize};
use wirerpc_codec::RpcServer;

pub const ECHO_CALL: &str = "Echo.Call";
pub const ARITH_ADD: &str = "Arith.Add";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoArgs {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoReply {
    pub text: String,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddArgs {
    pub a: i64,
    pub b: i64,
}

pub fn echo(args: EchoArgs) -> Result<EchoReply, String> {
    let len = args.text.chars().count();
    Ok(EchoReply {
        text: args.text,
        len,
    })
}

pub fn add(args: AddArgs) -> Result<i64, String> {
    args.a
        .checked_add(args.b)
        .ok_or_else(|| format!("{} + {} overflows i64", args.a, args.b))
}

pub fn register_all(server: &RpcServer) {
    server.register(ECHO_CALL, echo);
    server.register(ARITH_ADD, add);
}

#[cfg(test)]
mod tests {
    use super::{add, echo, register_all, AddArgs, EchoArgs, ARITH_ADD, ECHO_CALL};
    use wirerpc_codec::RpcServer;

    #[test]
    fn echo_counts_characters() {
        let reply = echo(EchoArgs {
            text: "héllo".into(),
        })
        .expect("echo");
        assert_eq!(reply.text, "héllo");
        assert_eq!(reply.len, 5);
    }

    #[test]
    fn add_reports_overflow() {
        assert_eq!(add(AddArgs { a: 2, b: 3 }), Ok(5));
        assert!(add(AddArgs { a: i64::MAX, b: 1 }).is_err());
    }

    #[test]
    fn register_all_serves_both_methods() {
        let server = RpcServer::new();
        register_all(&server);
        assert_eq!(server.methods(), vec![ARITH_ADD.to_string(), ECHO_CALL.to_string()]);
    }
}
