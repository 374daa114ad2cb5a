//! Adversarial security tests for the OT protocol
//!
//! These tests drive the framed sender with malformed, replayed or tampered
//! messages and check that the session aborts instead of answering.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use curve25519_dalek::ristretto::RistrettoPoint;
    use curve25519_dalek::traits::Identity;
    use oblivids_protocol::{BaseOtMsgPayload, ErrorCode, Header, Message, DIGEST_LEN};

    use crate::ot256::{SlotTable, SLOTS};
    use crate::receiver::OtReceiver;
    use crate::sender::{OtSender, PackageInfo};
    use crate::session::{OtSessionConfig, OtSessionState};
    use crate::OtError;

    struct Rows;

    impl SlotTable for Rows {
        fn entry_len(&self) -> usize {
            4
        }

        fn row_count(&self) -> u32 {
            10
        }

        fn fill_row(&self, label: u32, out: &mut [u8]) -> crate::Result<()> {
            for (t, slot) in out.chunks_exact_mut(4).enumerate() {
                slot.copy_from_slice(&((label << 8) | t as u32).to_le_bytes());
            }
            Ok(())
        }
    }

    const DIGEST: [u8; DIGEST_LEN] = [7u8; DIGEST_LEN];

    fn new_sender(config: OtSessionConfig) -> OtSender<Rows> {
        let package = PackageInfo {
            digest: DIGEST,
            outmax: 1,
            cmax: 1,
        };
        OtSender::new(Arc::new(Rows), config, package).with_seed(31)
    }

    /// Helper to set up a complete OT session
    fn setup_session_with(config: OtSessionConfig) -> (OtSender<Rows>, OtReceiver) {
        let mut sender = new_sender(config);
        let mut receiver = OtReceiver::new(DIGEST).with_seed(32);

        let (_, init) = receiver.generate_session_init();
        let (params_header, params) = sender.handle_session_init(&init).unwrap();
        receiver
            .handle_session_params(&params_header, &params)
            .unwrap();

        let (base_header, base_msg) = receiver.generate_base_ot_init().unwrap();
        let (reply_header, reply) = sender.handle_base_ot_msg(&base_header, &base_msg).unwrap();
        receiver
            .handle_base_ot_response(&reply_header, &reply)
            .unwrap();

        (sender, receiver)
    }

    fn setup_session() -> (OtSender<Rows>, OtReceiver) {
        setup_session_with(OtSessionConfig::default())
    }

    fn extend(sender: &mut OtSender<Rows>, receiver: &mut OtReceiver, count: u32) {
        let (h, req) = receiver.generate_extend(count).unwrap();
        let (rh, resp) = sender.handle_extend(&h, &req).unwrap();
        receiver.handle_extend_response(&rh, &resp).unwrap();
    }

    fn error_code(reply: &Message) -> Option<ErrorCode> {
        match reply {
            Message::Error { payload, .. } => Some(payload.code),
            _ => None,
        }
    }

    // ==================== Round Enforcement Tests ====================

    #[test]
    fn test_round_replay_rejected() {
        let (mut sender, mut receiver) = setup_session();
        extend(&mut sender, &mut receiver, 16);

        let (qh, query) = receiver.generate_byte_query(0, 1).unwrap();
        let (ah, answer) = sender.handle_byte_query(&qh, &query).unwrap();
        receiver.handle_byte_answer(&ah, &answer).unwrap();

        // Replay the same query with the same round
        let result = sender.handle_byte_query(&qh, &query);
        assert!(matches!(
            result,
            Err(OtError::RoundMismatch {
                expected: 3,
                got: 2
            })
        ));
        assert!(sender.is_aborted());
    }

    #[test]
    fn test_round_skip_rejected() {
        let (mut sender, mut receiver) = setup_session();
        extend(&mut sender, &mut receiver, 16);

        let (mut qh, query) = receiver.generate_byte_query(0, 1).unwrap();
        qh.round += 5;

        let reply = sender.handle(Message::ByteQuery {
            header: qh,
            payload: query,
        });
        assert_eq!(error_code(&reply), Some(ErrorCode::BadRound));
        match reply {
            Message::Error { payload, .. } => assert_eq!(payload.detail, 2),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(sender.state(), OtSessionState::Aborted);
    }

    #[test]
    fn test_aborted_session_refuses_valid_round() {
        let (mut sender, mut receiver) = setup_session();
        extend(&mut sender, &mut receiver, 16);

        let (qh, query) = receiver.generate_byte_query(0, 1).unwrap();
        let mut bad = qh.clone();
        bad.round = 0;
        let _ = sender.handle_byte_query(&bad, &query);

        let result = sender.handle_byte_query(&qh, &query);
        assert!(matches!(result, Err(OtError::SessionAborted)));
    }

    #[test]
    fn test_query_before_ready_rejected() {
        let mut sender = new_sender(OtSessionConfig::default());
        let receiver = OtReceiver::new(DIGEST);
        let (_, init) = receiver.generate_session_init();
        let (params_header, _) = sender.handle_session_init(&init).unwrap();

        let header = Header::new(params_header.session_id, 1);
        let query = oblivids_protocol::ByteQueryPayload {
            row_label: 0,
            blob: vec![0],
        };
        let result = sender.handle_byte_query(&header, &query);
        assert!(matches!(result, Err(OtError::SessionNotInitialized)));
    }

    #[test]
    fn test_wrong_session_id_rejected() {
        let (mut sender, mut receiver) = setup_session();
        let (mut h, req) = receiver.generate_extend(8).unwrap();
        h.session_id[0] ^= 0xFF;

        let result = sender.handle_extend(&h, &req);
        assert!(matches!(result, Err(OtError::InvalidSessionId)));
    }

    #[test]
    fn test_round_budget_enforced() {
        let config = OtSessionConfig {
            max_rounds: 2,
            ..Default::default()
        };
        let (mut sender, mut receiver) = setup_session_with(config);
        extend(&mut sender, &mut receiver, 16);

        let (qh, query) = receiver.generate_byte_query(0, 1).unwrap();
        let (ah, answer) = sender.handle_byte_query(&qh, &query).unwrap();
        receiver.handle_byte_answer(&ah, &answer).unwrap();

        assert!(matches!(
            receiver.generate_byte_query(0, 2),
            Err(OtError::SessionExpired)
        ));
    }

    // ==================== Base OT Tests ====================

    #[test]
    fn test_identity_point_aborts_generically() {
        let mut sender = new_sender(OtSessionConfig::default());
        let receiver = OtReceiver::new(DIGEST);
        let (_, init) = receiver.generate_session_init();
        let (params_header, _) = sender.handle_session_init(&init).unwrap();

        let identity = RistrettoPoint::identity().compress().to_bytes().to_vec();
        let reply = sender.handle(Message::BaseOtMsg {
            header: Header::new(params_header.session_id, 0),
            payload: BaseOtMsgPayload::new(1, false, identity),
        });

        match reply {
            Message::Error { payload, .. } => {
                assert_eq!(payload.code, ErrorCode::ProtocolAborted);
                assert_eq!(payload.detail, 0);
                assert_eq!(payload.message, "protocol aborted");
            }
            other => panic!("expected error, got {:?}", other),
        }
        assert!(sender.is_aborted());
    }

    #[test]
    fn test_second_base_ot_rejected() {
        let (mut sender, receiver) = setup_session();

        let reply = sender.handle(Message::BaseOtMsg {
            header: Header::new(*receiver.session_id(), 0),
            payload: BaseOtMsgPayload::new(1, false, vec![0u8; 32]),
        });
        assert!(error_code(&reply).is_some());
    }

    // ==================== Extension Tests ====================

    #[test]
    fn test_tampered_extension_aborts() {
        let (mut sender, mut receiver) = setup_session();
        let (h, mut req) = receiver.generate_extend(32).unwrap();
        req.blob[100] ^= 0x10;

        let reply = sender.handle(Message::ExtendRequest {
            header: h,
            payload: req,
        });
        assert_eq!(error_code(&reply), Some(ErrorCode::ProtocolAborted));
        assert!(sender.is_aborted());
    }

    #[test]
    fn test_batch_size_exceeded_rejected() {
        let config = OtSessionConfig {
            max_extend: 64,
            ..Default::default()
        };
        let (mut sender, mut receiver) = setup_session_with(config);
        let (h, req) = receiver.generate_extend(128).unwrap();

        let result = sender.handle_extend(&h, &req);
        assert!(matches!(result, Err(OtError::BatchSizeExceeded { .. })));
    }

    #[test]
    fn test_query_with_empty_pool_rejected() {
        let (mut sender, mut receiver) = setup_session();
        extend(&mut sender, &mut receiver, 8);

        let (qh, query) = receiver.generate_byte_query(0, 0).unwrap();
        let (ah, answer) = sender.handle_byte_query(&qh, &query).unwrap();
        receiver.handle_byte_answer(&ah, &answer).unwrap();

        // The client has nothing left; forge a query anyway
        let header = Header::new(*receiver.session_id(), receiver.next_round());
        let forged = oblivids_protocol::ByteQueryPayload {
            row_label: 0,
            blob: vec![0],
        };
        let result = sender.handle_byte_query(&header, &forged);
        assert!(matches!(result, Err(OtError::PoolExhausted { .. })));
    }

    // ==================== Answer Tests ====================

    #[test]
    fn test_out_of_range_row_rejected() {
        let (mut sender, mut receiver) = setup_session();
        extend(&mut sender, &mut receiver, 8);

        let (qh, query) = receiver.generate_byte_query(10, 0).unwrap();
        let reply = sender.handle(Message::ByteQuery {
            header: qh,
            payload: query,
        });
        assert_eq!(error_code(&reply), Some(ErrorCode::InvalidRow));
    }

    #[test]
    fn test_answers_match_table() {
        let (mut sender, mut receiver) = setup_session();
        extend(&mut sender, &mut receiver, 64);

        for (label, x) in [(0u32, 0u8), (9, 255), (4, 128)] {
            let (qh, query) = receiver.generate_byte_query(label, x).unwrap();
            let (ah, answer) = sender.handle_byte_query(&qh, &query).unwrap();
            assert_eq!(answer.blob.len(), SLOTS * 4);

            let entry = receiver.handle_byte_answer(&ah, &answer).unwrap();
            assert_eq!(entry, ((label << 8) | x as u32).to_le_bytes().to_vec());
        }
    }

    #[test]
    fn test_answer_for_other_row_rejected() {
        let (mut sender, mut receiver) = setup_session();
        extend(&mut sender, &mut receiver, 16);

        let (qh, query) = receiver.generate_byte_query(2, 5).unwrap();
        let (ah, mut answer) = sender.handle_byte_query(&qh, &query).unwrap();
        answer.row_label = 3;

        let result = receiver.handle_byte_answer(&ah, &answer);
        assert!(matches!(result, Err(OtError::UnexpectedMessage(_))));
        assert_eq!(receiver.state(), OtSessionState::Aborted);
    }

    #[test]
    fn test_peer_error_aborts_client() {
        let (_, mut receiver) = setup_session();
        let err = receiver.handle_error(&oblivids_protocol::ErrorPayload::aborted());

        assert!(matches!(
            err,
            OtError::PeerError {
                code: ErrorCode::ProtocolAborted,
                ..
            }
        ));
        assert_eq!(receiver.state(), OtSessionState::Aborted);
    }
}
