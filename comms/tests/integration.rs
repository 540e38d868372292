use comms::msg::{Command, Msg, Payload};
use tokio::io;

#[tokio::test]
async fn control_message_round_trips_over_duplex() {
    const SIZE: usize = 128;

    let (one, two) = io::duplex(SIZE);
    let (_, tx) = io::split(one);
    let (rx, _) = io::split(two);
    let (_, mut tx) = comms::channel(io::empty(), tx);
    let (mut rx, _) = comms::channel(rx, io::sink());

    tx.send(&Msg::Control(Command::Hello { rank: 3 }))
        .await
        .unwrap();

    let mut buf: Vec<u64> = Vec::new();
    let msg: Msg = rx.recv_into(&mut buf).await.unwrap();

    assert!(matches!(msg, Msg::Control(Command::Hello { rank: 3 })));
}

#[tokio::test]
async fn block_arrives_cell_for_cell() {
    const SIZE: usize = 64;

    let (one, two) = io::duplex(SIZE);
    let (_, tx) = io::split(one);
    let (rx, _) = io::split(two);
    let (_, mut tx) = comms::channel(io::empty(), tx);
    let (mut rx, _) = comms::channel(rx, io::sink());

    let cells: Vec<f64> = (0..16).map(|x| x as f64 / 3.0).collect();
    let expected = cells.clone();

    // The block is larger than the pipe, so the send has to run concurrently.
    let sender = tokio::spawn(async move {
        let msg = Msg::Data(Payload::Block {
            round: 2,
            origin: 4,
            len: 4,
            cells: &cells,
        });
        tx.send(&msg).await
    });

    let mut buf: Vec<f64> = Vec::new();
    let msg: Msg = rx.recv_into(&mut buf).await.unwrap();
    sender.await.unwrap().unwrap();

    let Msg::Data(Payload::Block {
        round,
        origin,
        len,
        cells,
    }) = msg
    else {
        panic!("expected a block");
    };

    assert_eq!((round, origin, len), (2, 4, 4));
    assert_eq!(cells, expected.as_slice());
}

#[tokio::test]
async fn closed_pipe_is_an_error() {
    let (one, two) = io::duplex(16);
    drop(one);

    let (rx, _) = io::split(two);
    let (mut rx, _) = comms::channel(rx, io::sink());

    let mut buf: Vec<u64> = Vec::new();
    let res: std::io::Result<Msg> = rx.recv_into(&mut buf).await;
    assert_eq!(res.unwrap_err().kind(), std::io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn oversized_frame_is_refused_before_reading() {
    let (one, two) = io::duplex(256);
    let (_, tx) = io::split(one);
    let (rx, _) = io::split(two);
    let (_, mut tx) = comms::channel(io::empty(), tx);
    let (rx, _) = comms::channel(rx, io::sink());
    let mut rx = rx.with_max_frame(16);

    let cells = [0.5; 9];
    tx.send(&Msg::Data(Payload::Block {
        round: 1,
        origin: 0,
        len: 3,
        cells: &cells,
    }))
    .await
    .unwrap();

    let mut buf: Vec<u64> = Vec::new();
    let res: std::io::Result<Msg> = rx.recv_into(&mut buf).await;
    assert_eq!(res.unwrap_err().kind(), std::io::ErrorKind::InvalidData);
}
