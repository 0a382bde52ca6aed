//! End-to-end scenarios against a minimal scripted SMTP server on
//! loopback, covering the dialog-level verdicts that a unit test
//! working purely on `classify_rcpt_response` can't exercise: the full
//! connect/EHLO/MAIL FROM/RCPT TO round trip through `VerifyEngine`.

use k9::assert_equal;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use verify_core::{Reachable, Tri, VerifyEngine, VerifyOptions};

/// Starts a one-shot SMTP server on loopback that sends `greeting` up
/// front, then replies with the next line of `replies` for each line it
/// reads from the client (EHLO, MAIL FROM, RCPT TO, QUIT in that
/// order), and returns the port it bound.
async fn spawn_scripted_server(greeting: &'static str, replies: Vec<&'static str>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback listener");
    let port = listener.local_addr().expect("local addr").port();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept connection");
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        writer.write_all(greeting.as_bytes()).await.expect("write greeting");

        for reply in replies {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            if writer.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    port
}

fn engine_against(port: u16) -> (VerifyEngine, VerifyOptions) {
    let resolver = mx_resolver::TestResolver::default().with_mx("example.com", vec![(0, "127.0.0.1")]);
    let engine = VerifyEngine::with_resolver(Arc::new(resolver));

    let mut options = VerifyOptions::default();
    options.verify_mx = true;
    options.verify_smtp = true;
    options.smtp_options.ports = vec![port];
    options.smtp_options.max_retries = 1;
    (engine, options)
}

#[tokio::test]
async fn scenario_no_network_checks_reports_unknown() {
    let engine = VerifyEngine::with_resolver(Arc::new(mx_resolver::TestResolver::default()));
    let mut options = VerifyOptions::default();
    options.verify_mx = false;
    options.verify_smtp = false;

    let result = engine.verify_one("a@b.co", &options).await;

    assert_equal!(result.reachable, Reachable::Unknown);
    assert!(result.syntax.is_valid);
    assert_equal!(result.syntax.local.as_deref(), Some("a"));
    assert_equal!(result.syntax.domain.as_deref(), Some("b.co"));
    assert!(result.mx.is_none());
    assert!(result.smtp.is_none());
}

#[tokio::test]
async fn scenario_malformed_address_is_invalid() {
    let engine = VerifyEngine::with_resolver(Arc::new(mx_resolver::TestResolver::default()));
    let result = engine.verify_one("invalid-email", &VerifyOptions::default()).await;

    assert_equal!(result.reachable, Reachable::Invalid);
    assert!(!result.syntax.is_valid);
    assert!(result.syntax.error.unwrap().contains("format"));
}

#[tokio::test]
async fn scenario_no_mx_route_is_invalid_without_dialing_smtp() {
    let resolver = mx_resolver::TestResolver::default().with_mx("no-mx.example", vec![]);
    let engine = VerifyEngine::with_resolver(Arc::new(resolver));
    let mut options = VerifyOptions::default();
    options.verify_mx = true;
    options.verify_smtp = true;

    let result = engine.verify_one("test@no-mx.example", &options).await;

    assert_equal!(result.reachable, Reachable::Invalid);
    assert_equal!(result.mx.as_ref().map(|m| m.success), Some(false));
    assert!(result.smtp.is_none());
}

#[tokio::test]
async fn scenario_user_unknown_rejection_is_invalid() {
    let port = spawn_scripted_server(
        "220 mx.example.com ESMTP\r\n",
        vec![
            "250 mx.example.com\r\n",
            "250 ok\r\n",
            "550 5.1.1 User unknown\r\n",
            "221 bye\r\n",
        ],
    )
    .await;
    let (engine, options) = engine_against(port);

    let result = engine.verify_one("nobody@example.com", &options).await;

    assert_equal!(result.reachable, Reachable::Invalid);
    let smtp = result.smtp.expect("smtp result present");
    assert_equal!(smtp.deliverable, Tri::No);
    assert_equal!(smtp.kind, reply_classify::ErrorKind::Invalid);
}

#[tokio::test]
async fn scenario_mailbox_over_quota_is_risky_not_invalid() {
    let port = spawn_scripted_server(
        "220 mx.example.com ESMTP\r\n",
        vec![
            "250 mx.example.com\r\n",
            "250 ok\r\n",
            "552 Mailbox over quota\r\n",
            "221 bye\r\n",
        ],
    )
    .await;
    let (engine, options) = engine_against(port);

    let result = engine.verify_one("full@example.com", &options).await;

    assert_equal!(result.reachable, Reachable::Risky);
    let smtp = result.smtp.expect("smtp result present");
    assert_equal!(smtp.deliverable, Tri::No);
    assert_equal!(smtp.kind, reply_classify::ErrorKind::FullInbox);
}

#[tokio::test]
async fn scenario_accepted_recipient_is_safe() {
    // A Yes verdict on the primary RCPT TO makes the engine dial a
    // second, catch-all probe against the same host; script both
    // connections so the server accepts the first and rejects the
    // second, leaving the address Safe rather than Risky/catch-all.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback listener");
    let port = listener.local_addr().expect("local addr").port();

    tokio::spawn(async move {
        for reply_to_rcpt in ["250 ok\r\n", "550 5.1.1 User unknown\r\n"] {
            let (stream, _) = listener.accept().await.expect("accept connection");
            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);
            writer.write_all(b"220 mx.example.com ESMTP\r\n").await.expect("write greeting");
            for reply in ["250 mx.example.com\r\n", "250 ok\r\n", reply_to_rcpt, "221 bye\r\n"] {
                let mut line = String::new();
                if matches!(reader.read_line(&mut line).await, Ok(0) | Err(_)) {
                    break;
                }
                if writer.write_all(reply.as_bytes()).await.is_err() {
                    break;
                }
            }
        }
    });

    let (engine, options) = engine_against(port);
    let result = engine.verify_one("person@example.com", &options).await;

    let smtp = result.smtp.expect("smtp result present");
    assert_equal!(smtp.deliverable, Tri::Yes);
    assert!(!smtp.is_catch_all);
    assert_equal!(result.reachable, Reachable::Safe);
}
