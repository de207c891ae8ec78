//! Integration tests for PRIVMSG, NOTICE, and QUIT fan-out.

mod common;

use common::{TestClient, TestServer};

#[test]
fn channel_message_reaches_everyone_but_the_sender() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    let mut carol = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    carol.register("carol");
    alice.join("#x");
    bob.join("#x");
    carol.join("#x");
    alice.drain();
    bob.drain();
    carol.drain();

    alice.send("PRIVMSG #x :hi");

    let to_bob = bob.recv_until("PRIVMSG", |l| l.contains("PRIVMSG"));
    assert!(to_bob.starts_with(":alice!alice@"), "got: {}", to_bob);
    assert!(to_bob.ends_with("PRIVMSG #x :hi"));

    let to_carol = carol.recv_until("PRIVMSG", |l| l.contains("PRIVMSG"));
    assert!(to_carol.ends_with("PRIVMSG #x :hi"));

    let echoes = alice.drain();
    assert!(
        !echoes.iter().any(|l| l.contains("PRIVMSG")),
        "sender must not hear itself: {:?}",
        echoes
    );
}

#[test]
fn private_message_goes_to_one_nick() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");

    alice.send("PRIVMSG bob :psst");
    let msg = bob.recv_until("PRIVMSG", |l| l.contains("PRIVMSG"));
    assert!(msg.starts_with(":alice!"));
    assert!(msg.ends_with("PRIVMSG bob :psst"));
}

#[test]
fn nick_targets_fold_case() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");

    alice.send("PRIVMSG BOB :case test");
    let msg = bob.recv_until("PRIVMSG", |l| l.contains("PRIVMSG"));
    assert!(msg.contains("case test"));
}

#[test]
fn privmsg_error_numerics() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    alice.register("alice");

    alice.send("PRIVMSG ghost :anyone?");
    alice.recv_until("401", |l| l.contains(" 401 "));

    alice.send("PRIVMSG");
    alice.recv_until("411", |l| l.contains(" 411 "));

    alice.send("PRIVMSG ghost");
    alice.recv_until("412", |l| l.contains(" 412 "));
}

#[test]
fn non_members_cannot_send_to_a_channel() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#x");

    bob.send("PRIVMSG #x :outside voice");
    let reply = bob.recv_until("404", |l| l.contains(" 404 "));
    assert!(reply.contains("Cannot send to channel"));
}

#[test]
fn notice_never_generates_replies() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    alice.register("alice");

    alice.send("NOTICE ghost :are you there");
    alice.send("NOTICE #nowhere :hello");
    alice.send("NOTICE");
    let replies = alice.drain();
    assert!(
        replies.is_empty(),
        "NOTICE must stay silent: {:?}",
        replies
    );

    // The connection is still fine.
    alice.send("PING ok");
    alice.recv_until("PONG", |l| l.contains("ok"));
}

#[test]
fn notice_still_delivers_to_channels() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#x");
    bob.join("#x");
    bob.drain();

    alice.send("NOTICE #x :heads up");
    let msg = bob.recv_until("NOTICE", |l| l.contains("NOTICE"));
    assert!(msg.ends_with("NOTICE #x :heads up"));
}

#[test]
fn multiple_targets_each_get_a_copy() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    let mut carol = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    carol.register("carol");

    alice.send("PRIVMSG bob,carol :fan out");
    bob.recv_until("PRIVMSG", |l| l.contains("fan out"));
    carol.recv_until("PRIVMSG", |l| l.contains("fan out"));
}

#[test]
fn quit_broadcasts_to_channel_peers_and_closes() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#x");
    bob.join("#x");
    bob.drain();

    alice.send("QUIT :gone home");
    let quit = bob.recv_until("QUIT", |l| l.contains("QUIT"));
    assert!(quit.starts_with(":alice!"));
    assert!(quit.ends_with(":gone home"));

    let error = alice.recv_until("ERROR", |l| l.contains("ERROR"));
    assert!(error.contains("Closing Link"));
    assert!(alice.wait_closed());

    // Alice's nick is free again afterwards.
    let mut replacement = TestClient::connect(&server);
    replacement.register("alice");
}

#[test]
fn abrupt_disconnect_broadcasts_a_quit() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#x");
    bob.join("#x");
    bob.drain();

    drop(alice);
    let quit = bob.recv_until("QUIT", |l| l.contains("QUIT"));
    assert!(quit.starts_with(":alice!"));
}

#[test]
fn quitting_empties_and_destroys_channels() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    alice.register("alice");
    alice.join("#solo");
    alice.send("MODE #solo +i");
    alice.recv_until("MODE echo", |l| l.contains("MODE"));
    alice.send("QUIT :bye");
    assert!(alice.wait_closed());

    // The channel died with its last member; a new join recreates it
    // without the old +i.
    let mut bob = TestClient::connect(&server);
    bob.register("bob");
    bob.send("JOIN #solo");
    bob.recv_until("end of names", |l| l.contains(" 366 "));
}
