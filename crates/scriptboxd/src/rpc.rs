//! Protobuf messages and gRPC plumbing for `sandbox.Sandbox`, generated from
//! `proto/sandbox.proto` at build time.

#![allow(missing_docs)]

tonic::include_proto!("sandbox");

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn test_missing_sub_messages_decode_as_none() {
        let bytes = StarlarkScript {
            script: "print(1)".into(),
            guild_id: 9,
            ..Default::default()
        }
        .encode_to_vec();
        let decoded = StarlarkScript::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.script, "print(1)");
        assert_eq!(decoded.guild_id, 9);
        assert!(decoded.message_author.is_none());
        assert!(decoded.channel.is_none());
    }

    #[test]
    fn test_wide_fields_survive_the_wire() {
        let author = Author {
            id: u64::MAX,
            roles: vec![436189230390050826, u64::MAX],
            permissions: 1 << 40,
            ..Default::default()
        };
        let decoded = Author::decode(author.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, author);

        let script = StarlarkScript {
            count: -3,
            ..Default::default()
        };
        let decoded = StarlarkScript::decode(script.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.count, -3);
    }
}
