//! Integration tests spanning the crates: the frame codec over real TCP,
//! the full server handshake, and the local game engine driven end to end.

use client::game::{GameEvent, Intent, LocalGame};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::network::Server;
use shared::framing::{read_message, write_message};
use shared::piece::{random_shape, Piece, PieceId, Shape};
use shared::{Message, BOARD_HEIGHT, BOARD_WIDTH};
use std::io::ErrorKind;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

async fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (server, _) = listener.accept().await.unwrap();
    (client, server)
}

#[tokio::test]
async fn frames_roundtrip_over_tcp() {
    let (mut client, mut server) = tcp_pair().await;

    write_message(
        &mut client,
        &Message::SetName {
            name: "Alice".to_string(),
        },
    )
    .await
    .unwrap();

    match read_message(&mut server).await.unwrap() {
        Message::SetName { name } => assert_eq!(name, "Alice"),
        other => panic!("unexpected message: {:?}", other),
    }
}

#[tokio::test]
async fn back_to_back_frames_arrive_in_order() {
    let (mut client, mut server) = tcp_pair().await;

    write_message(&mut client, &Message::StartGame).await.unwrap();
    write_message(&mut client, &Message::LineCleared { count: 2 })
        .await
        .unwrap();
    write_message(&mut client, &Message::GameOver).await.unwrap();

    assert!(matches!(
        read_message(&mut server).await.unwrap(),
        Message::StartGame
    ));
    assert!(matches!(
        read_message(&mut server).await.unwrap(),
        Message::LineCleared { count: 2 }
    ));
    assert!(matches!(
        read_message(&mut server).await.unwrap(),
        Message::GameOver
    ));
}

#[tokio::test]
async fn undecodable_frame_keeps_the_stream_usable() {
    let (mut client, mut server) = tcp_pair().await;

    // A well-formed frame whose payload is not a valid message.
    let garbage = [0xffu8; 6];
    client
        .write_all(&(garbage.len() as u32).to_le_bytes())
        .await
        .unwrap();
    client.write_all(&garbage).await.unwrap();
    write_message(&mut client, &Message::GameOver).await.unwrap();

    let err = read_message(&mut server).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
    assert!(matches!(
        read_message(&mut server).await.unwrap(),
        Message::GameOver
    ));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected() {
    let (mut client, mut server) = tcp_pair().await;

    client
        .write_all(&u32::MAX.to_le_bytes())
        .await
        .unwrap();

    let err = read_message(&mut server).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

async fn register(stream: &mut TcpStream, name: &str) -> (u32, bool) {
    match read_message(stream).await.unwrap() {
        Message::RequestName => {}
        other => panic!("expected name prompt, got {:?}", other),
    }
    write_message(
        stream,
        &Message::SetName {
            name: name.to_string(),
        },
    )
    .await
    .unwrap();
    match read_message(stream).await.unwrap() {
        Message::Init {
            player_id, is_host, ..
        } => (player_id, is_host),
        other => panic!("expected init, got {:?}", other),
    }
}

#[tokio::test]
async fn two_clients_register_start_and_exchange_penalties() {
    let server = Server::new("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut alice = TcpStream::connect(addr).await.unwrap();
    let (alice_id, alice_is_host) = register(&mut alice, "Alice").await;
    assert!(alice_is_host);

    let mut bob = TcpStream::connect(addr).await.unwrap();
    let (bob_id, bob_is_host) = register(&mut bob, "Bob").await;
    assert!(!bob_is_host);
    assert_ne!(alice_id, bob_id);

    match read_message(&mut alice).await.unwrap() {
        Message::PlayerJoined { player } => assert_eq!(player.name, "Bob"),
        other => panic!("expected join notice, got {:?}", other),
    }

    write_message(&mut alice, &Message::StartGame).await.unwrap();
    assert!(matches!(
        read_message(&mut alice).await.unwrap(),
        Message::GameStart
    ));
    assert!(matches!(
        read_message(&mut bob).await.unwrap(),
        Message::GameStart
    ));

    // Bob clears two rows; Alice is the only possible penalty target.
    write_message(&mut bob, &Message::LineCleared { count: 2 })
        .await
        .unwrap();
    for stream in [&mut alice, &mut bob] {
        match read_message(stream).await.unwrap() {
            Message::Penalty {
                target_player_id,
                count,
                source_player_id,
                source_name,
            } => {
                assert_eq!(target_player_id, alice_id);
                assert_eq!(count, 2);
                assert_eq!(source_player_id, bob_id);
                assert_eq!(source_name, "Bob");
            }
            other => panic!("expected penalty, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn server_reports_its_bound_address_before_running() {
    let server = Server::new("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    assert_ne!(addr.port(), 0);

    // The address must stay reachable once the server is running.
    tokio::spawn(server.run());
    let mut stream = TcpStream::connect(addr).await.unwrap();
    assert!(matches!(
        read_message(&mut stream).await.unwrap(),
        Message::RequestName
    ));
}

#[tokio::test]
async fn registration_racing_a_game_start_is_rejected() {
    let server = Server::new("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut alice = TcpStream::connect(addr).await.unwrap();
    register(&mut alice, "Alice").await;

    // The latecomer is accepted into the lobby but has not registered yet.
    let mut late = TcpStream::connect(addr).await.unwrap();
    assert!(matches!(
        read_message(&mut late).await.unwrap(),
        Message::RequestName
    ));

    write_message(&mut alice, &Message::StartGame).await.unwrap();
    assert!(matches!(
        read_message(&mut alice).await.unwrap(),
        Message::GameStart
    ));

    // The name arrives after the game started: error and close, no roster
    // entry, no join broadcast to Alice.
    write_message(
        &mut late,
        &Message::SetName {
            name: "Mallory".to_string(),
        },
    )
    .await
    .unwrap();
    match read_message(&mut late).await.unwrap() {
        Message::Error { message } => assert!(message.contains("in progress")),
        other => panic!("expected rejection, got {:?}", other),
    }
    let err = read_message(&mut late).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn joining_a_running_game_is_rejected() {
    let server = Server::new("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut alice = TcpStream::connect(addr).await.unwrap();
    register(&mut alice, "Alice").await;
    write_message(&mut alice, &Message::StartGame).await.unwrap();
    assert!(matches!(
        read_message(&mut alice).await.unwrap(),
        Message::GameStart
    ));

    let mut late = TcpStream::connect(addr).await.unwrap();
    match read_message(&mut late).await.unwrap() {
        Message::Error { message } => assert!(message.contains("in progress")),
        other => panic!("expected rejection, got {:?}", other),
    }
    // The server closes the connection after the rejection.
    let err = read_message(&mut late).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn board_updates_are_relayed_with_the_connection_identity() {
    let server = Server::new("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut alice = TcpStream::connect(addr).await.unwrap();
    let (alice_id, _) = register(&mut alice, "Alice").await;
    let mut bob = TcpStream::connect(addr).await.unwrap();
    let (bob_id, _) = register(&mut bob, "Bob").await;
    match read_message(&mut alice).await.unwrap() {
        Message::PlayerJoined { .. } => {}
        other => panic!("expected join notice, got {:?}", other),
    }

    // Bob claims Alice's id in the payload; the relay must carry Bob's.
    let mut board = shared::Board::new();
    board.cells[BOARD_HEIGHT - 1][0] = 7;
    write_message(
        &mut bob,
        &Message::BoardUpdate {
            player_id: alice_id,
            board: board.clone(),
        },
    )
    .await
    .unwrap();

    match read_message(&mut alice).await.unwrap() {
        Message::BoardUpdate {
            player_id,
            board: relayed,
        } => {
            assert_eq!(player_id, bob_id);
            assert_eq!(relayed, board);
        }
        other => panic!("expected board relay, got {:?}", other),
    }
}

#[test]
fn hard_drop_stacks_pieces_from_the_bottom() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut game = LocalGame::new(&mut rng);
    game.piece = Piece::spawn(Shape::of(PieceId::O));

    game.apply_intent(Intent::HardDrop, &mut rng);
    assert_ne!(game.board.cells[BOARD_HEIGHT - 1][4], 0);

    game.piece = Piece::spawn(Shape::of(PieceId::O));
    game.apply_intent(Intent::HardDrop, &mut rng);
    // The second O rests on the first.
    assert_ne!(game.board.cells[BOARD_HEIGHT - 3][4], 0);
    assert_ne!(game.board.cells[BOARD_HEIGHT - 4][4], 0);
}

#[test]
fn engine_clears_a_row_built_from_multiple_pieces() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut game = LocalGame::new(&mut rng);

    // Fill the bottom row except where a vertical I will land.
    for col in 0..BOARD_WIDTH - 1 {
        game.board.cells[BOARD_HEIGHT - 1][col] = 2;
    }
    game.piece = Piece {
        shape: Shape::of(PieceId::I).rotated(),
        x: (BOARD_WIDTH - 3) as i32,
        y: 0,
    };

    let events = game.apply_intent(Intent::HardDrop, &mut rng);
    assert!(events.contains(&GameEvent::LinesCleared(1)));
    assert_eq!(game.lines_cleared, 1);
    // Three cells of the I remain above the cleared row.
    assert_ne!(game.board.cells[BOARD_HEIGHT - 1][BOARD_WIDTH - 1], 0);
    assert_ne!(game.board.cells[BOARD_HEIGHT - 3][BOARD_WIDTH - 1], 0);
    assert_eq!(game.board.cells[BOARD_HEIGHT - 1][0], 0);
}

#[test]
fn same_seed_yields_the_same_piece_sequence() {
    let mut a = StdRng::seed_from_u64(9);
    let mut b = StdRng::seed_from_u64(9);

    for _ in 0..32 {
        assert_eq!(random_shape(&mut a), random_shape(&mut b));
    }
}
