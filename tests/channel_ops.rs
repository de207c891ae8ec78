//! Integration tests for channel operations: JOIN, PART, TOPIC, NAMES,
//! KICK, INVITE, and MODE.

mod common;

use common::{TestClient, TestServer};

#[test]
fn first_join_creates_the_channel_with_creator_as_op() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    alice.register("alice");

    alice.send("JOIN #fresh");
    let echo = alice.recv_until("JOIN echo", |l| l.contains("JOIN"));
    assert!(echo.starts_with(":alice!alice@"), "echo: {}", echo);
    alice.recv_until("no topic", |l| l.contains(" 331 "));
    let names = alice.recv_until("names", |l| l.contains(" 353 "));
    assert!(names.contains("@alice"), "creator is op: {}", names);
    alice.recv_until("end of names", |l| l.contains(" 366 "));
}

#[test]
fn join_echo_reaches_existing_members() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");

    alice.join("#ops");
    bob.send("JOIN #ops");

    let seen = alice.recv_until("bob's JOIN", |l| l.contains("JOIN"));
    assert!(seen.starts_with(":bob!bob@"), "seen: {}", seen);
}

#[test]
fn part_broadcast_includes_the_reason() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#ops");
    bob.join("#ops");
    alice.drain();

    alice.send("PART #ops :gone fishing");
    let part = bob.recv_until("PART", |l| l.contains("PART"));
    assert!(part.starts_with(":alice!"));
    assert!(part.contains("#ops"));
    assert!(part.ends_with(":gone fishing"));

    // Alice sees her own PART too.
    let own = alice.recv_until("own PART", |l| l.contains("PART"));
    assert!(own.contains("#ops"));
}

#[test]
fn parting_a_channel_you_are_not_on_replies_442() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#ops");

    bob.send("PART #ops");
    bob.recv_until("442", |l| l.contains(" 442 "));

    bob.send("PART #nonexistent");
    bob.recv_until("403", |l| l.contains(" 403 "));
}

#[test]
fn topic_set_broadcasts_and_greets_new_joiners() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#ops");
    bob.join("#ops");
    alice.drain();

    alice.send("TOPIC #ops :stand back");
    let topic = bob.recv_until("TOPIC", |l| l.contains("TOPIC"));
    assert!(topic.starts_with(":alice!"));
    assert!(topic.ends_with(":stand back"));

    // A later joiner gets 332 instead of 331.
    let mut carol = TestClient::connect(&server);
    carol.register("carol");
    carol.send("JOIN #ops");
    let reply = carol.recv_until("332", |l| l.contains(" 332 "));
    assert!(reply.contains("stand back"));

    // Query works too.
    alice.drain();
    alice.send("TOPIC #ops");
    let reply = alice.recv_until("332", |l| l.contains(" 332 "));
    assert!(reply.contains("stand back"));
}

#[test]
fn topic_lock_restricts_topic_to_ops() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#ops");
    bob.join("#ops");
    alice.drain();

    alice.send("MODE #ops +t");
    alice.recv_until("MODE echo", |l| l.contains("MODE"));

    bob.drain();
    bob.send("TOPIC #ops :coup");
    bob.recv_until("482", |l| l.contains(" 482 "));

    // An op grant lifts the restriction.
    alice.send("MODE #ops +o bob");
    bob.recv_until("MODE +o", |l| l.contains("MODE") && l.contains("+o"));
    bob.send("TOPIC #ops :the people's topic");
    bob.recv_until("TOPIC echo", |l| l.contains("TOPIC"));
}

#[test]
fn kick_broadcasts_and_removes_the_target() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#ops");
    bob.join("#ops");
    alice.drain();
    bob.drain();

    alice.send("KICK #ops bob :enough");
    let kick = bob.recv_until("KICK", |l| l.contains("KICK"));
    assert!(kick.starts_with(":alice!"));
    assert!(kick.contains("bob"));
    assert!(kick.ends_with(":enough"));

    // Bob is really out: speaking in the channel now fails.
    bob.send("PRIVMSG #ops :still here?");
    bob.recv_until("404", |l| l.contains(" 404 "));
}

#[test]
fn kick_requires_operator_and_presence() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    let mut carol = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    carol.register("carol");
    alice.join("#ops");
    bob.join("#ops");

    bob.drain();
    bob.send("KICK #ops alice");
    bob.recv_until("482", |l| l.contains(" 482 "));

    alice.drain();
    alice.send("KICK #ops carol");
    alice.recv_until("441", |l| l.contains(" 441 "));

    alice.send("KICK #ops ghost");
    alice.recv_until("401", |l| l.contains(" 401 "));
}

#[test]
fn invite_only_flow() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");

    alice.join("#x");
    alice.send("MODE #x +i");
    alice.recv_until("MODE echo", |l| l.contains("MODE") && l.contains("+i"));

    bob.send("JOIN #x");
    let denied = bob.recv_until("473", |l| l.contains(" 473 "));
    assert!(denied.contains("+i"));

    alice.send("INVITE bob #x");
    let inviting = alice.recv_until("341", |l| l.contains(" 341 "));
    assert!(inviting.contains("bob"));
    assert!(inviting.contains("#x"));

    let invite = bob.recv_until("INVITE", |l| l.contains("INVITE"));
    assert!(invite.starts_with(":alice!"));

    bob.send("JOIN #x");
    bob.recv_until("names after join", |l| l.contains(" 353 "));
    bob.recv_until("end of names", |l| l.contains(" 366 "));
}

#[test]
fn invite_is_consumed_by_the_join() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");

    alice.join("#x");
    alice.send("MODE #x +i");
    alice.recv_until("MODE echo", |l| l.contains("MODE"));
    alice.send("INVITE bob #x");
    bob.recv_until("INVITE", |l| l.contains("INVITE"));

    bob.send("JOIN #x");
    bob.recv_until("end of names", |l| l.contains(" 366 "));
    bob.send("PART #x");
    bob.recv_until("own PART", |l| l.contains("PART"));

    // The earlier invite is spent.
    bob.send("JOIN #x");
    bob.recv_until("473", |l| l.contains(" 473 "));
}

#[test]
fn join_key_count_mismatch_replies_461_and_joins_nothing() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    alice.register("alice");

    alice.send("JOIN #a,#b onlyonekey");
    alice.recv_until("461", |l| l.contains(" 461 "));

    // The JOIN was aborted outright; neither channel exists.
    alice.send("PRIVMSG #a :anyone?");
    alice.recv_until("401", |l| l.contains(" 401 "));

    // Matching counts work.
    alice.send("JOIN #a,#b k1,k2");
    alice.recv_until("end of names", |l| l.contains(" 366 "));
}

#[test]
fn channel_key_and_limit_gate_joins() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");

    alice.join("#vault");
    alice.send("MODE #vault +k sekrit");
    alice.recv_until("MODE echo", |l| l.contains("MODE") && l.contains("+k"));

    bob.send("JOIN #vault");
    bob.recv_until("475", |l| l.contains(" 475 "));
    bob.send("JOIN #vault wrong");
    bob.recv_until("475 again", |l| l.contains(" 475 "));
    bob.send("JOIN #vault sekrit");
    bob.recv_until("end of names", |l| l.contains(" 366 "));

    // Now cap the room at its current population.
    alice.drain();
    alice.send("MODE #vault +l 2");
    alice.recv_until("MODE echo", |l| l.contains("+l"));

    let mut carol = TestClient::connect(&server);
    carol.register("carol");
    carol.send("JOIN #vault sekrit");
    carol.recv_until("471", |l| l.contains(" 471 "));
}

#[test]
fn mode_query_reports_current_modes() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    alice.register("alice");
    alice.join("#q");

    alice.send("MODE #q");
    let reply = alice.recv_until("324", |l| l.contains(" 324 "));
    assert!(reply.contains("#q"));

    alice.send("MODE #q +ik hushhush");
    alice.recv_until("MODE echo", |l| l.contains("+ik"));
    alice.send("MODE #q");
    let reply = alice.recv_until("324", |l| l.contains(" 324 "));
    assert!(reply.contains('i') && reply.contains('k'), "reply: {}", reply);
    assert!(reply.contains("hushhush"));
}

#[test]
fn mode_rejects_unknown_flags_and_non_ops() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#m");
    bob.join("#m");

    alice.drain();
    alice.send("MODE #m +z");
    alice.recv_until("472", |l| l.contains(" 472 "));

    bob.drain();
    bob.send("MODE #m +i");
    bob.recv_until("482", |l| l.contains(" 482 "));

    bob.send("MODE #nowhere +i");
    bob.recv_until("403", |l| l.contains(" 403 "));
}

#[test]
fn ban_list_query_is_empty() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    alice.register("alice");
    alice.join("#b");

    alice.send("MODE #b +b");
    let reply = alice.recv_until("368", |l| l.contains(" 368 "));
    assert!(reply.contains("#b"));
}

#[test]
fn names_command_lists_members() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#n");
    bob.join("#n");
    alice.drain();

    alice.send("NAMES #n");
    let names = alice.recv_until("353", |l| l.contains(" 353 "));
    assert!(names.contains("@alice"));
    assert!(names.contains("bob"));
    alice.recv_until("366", |l| l.contains(" 366 "));
}

#[test]
fn channel_names_fold_case_for_lookup() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");

    alice.join("#Mixed");
    bob.send("JOIN #mixed");
    bob.recv_until("end of names", |l| l.contains(" 366 "));

    // Display case is the creator's spelling.
    let seen = alice.recv_until("bob's JOIN", |l| l.contains("JOIN"));
    assert!(seen.contains("#Mixed"), "seen: {}", seen);
}

#[test]
fn nick_change_is_echoed_to_self_and_channel_peers() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#n");
    bob.join("#n");
    alice.drain();
    bob.drain();

    alice.send("NICK alicia");
    let own = alice.recv_until("own NICK", |l| l.contains("NICK"));
    assert!(own.starts_with(":alice!"));
    assert!(own.ends_with("alicia"));

    let seen = bob.recv_until("peer NICK", |l| l.contains("NICK"));
    assert!(seen.starts_with(":alice!"));
    assert!(seen.ends_with("alicia"));

    // The old nick is free again.
    let mut carol = TestClient::connect(&server);
    carol.register("alice");
}

#[test]
fn operator_succession_when_the_last_op_departs() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#s");
    bob.join("#s");
    bob.drain();

    alice.send("PART #s");
    bob.recv_until("PART", |l| l.contains("PART"));
    let promotion = bob.recv_until("server MODE", |l| l.contains("MODE"));
    assert!(
        promotion.starts_with(":ircserver MODE #s +o bob"),
        "promotion: {}",
        promotion
    );

    // Bob really is an op now.
    bob.send("MODE #s +t");
    bob.recv_until("MODE echo", |l| l.contains("+t"));
}

#[test]
fn join_zero_leaves_every_channel() {
    let server = TestServer::spawn();
    let mut alice = TestClient::connect(&server);
    let mut bob = TestClient::connect(&server);
    alice.register("alice");
    bob.register("bob");
    alice.join("#a");
    alice.join("#b");
    bob.join("#a");
    bob.drain();

    alice.send("JOIN 0");
    let part = bob.recv_until("PART", |l| l.contains("PART"));
    assert!(part.starts_with(":alice!"));

    // Alice can recreate #a as a fresh channel (she is op again).
    alice.drain();
    alice.send("JOIN #c");
    let names = alice.recv_until("names", |l| l.contains(" 353 "));
    assert!(names.contains("@alice"));
}
