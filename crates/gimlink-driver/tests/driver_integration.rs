use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use gimlink_driver::{
    DriverConfig, GimbalDriver, HeartbeatConfig, RecordState, SendOutcome, SendRequest,
};
use gimlink_frame::{decode_frame, encode_frame, Frame, FrameReader};
use gimlink_transport::{Endpoint, Link};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

type Log = Arc<Mutex<Vec<Frame>>>;

fn wire(frame: &Frame) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(frame, &mut buf).unwrap();
    buf.to_vec()
}

fn quiet_config() -> DriverConfig {
    DriverConfig {
        heartbeat: HeartbeatConfig::disabled(),
        ..DriverConfig::default()
    }
}

/// Simulated gimbal: logs every frame it receives and writes back whatever
/// `respond` returns for it.
fn spawn_device<F>(stream: DuplexStream, respond: F) -> (Log, JoinHandle<()>)
where
    F: Fn(&Frame, usize) -> Vec<u8> + Send + 'static,
{
    let log: Log = Arc::default();
    let task_log = Arc::clone(&log);
    let task = tokio::spawn(async move {
        let (mut rx, mut tx) = tokio::io::split(stream);
        let mut reader = FrameReader::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = match rx.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            reader.push(&buf[..n]).unwrap();
            for frame in reader.drain() {
                let index = {
                    let mut log = task_log.lock().unwrap();
                    log.push(frame.clone());
                    log.len() - 1
                };
                let reply = respond(&frame, index);
                if !reply.is_empty() && tx.write_all(&reply).await.is_err() {
                    return;
                }
            }
        }
    });
    (log, task)
}

fn ack_all(frame: &Frame, _index: usize) -> Vec<u8> {
    if frame.needs_ack {
        wire(&Frame::ack(frame.sequence, frame.command_id, frame.payload.clone()))
    } else {
        Vec::new()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn read_frame(rx: &mut ReadHalf<DuplexStream>, reader: &mut FrameReader) -> Frame {
    let mut buf = [0u8; 256];
    loop {
        if let Some(frame) = reader.next_frame() {
            return frame;
        }
        let n = rx.read(&mut buf).await.unwrap();
        assert!(n > 0, "driver closed the link");
        reader.push(&buf[..n]).unwrap();
    }
}

async fn write_frame(tx: &mut WriteHalf<DuplexStream>, frame: &Frame) {
    tx.write_all(&wire(frame)).await.unwrap();
}

#[tokio::test]
async fn fire_and_forget_does_not_wait() {
    let driver = GimbalDriver::new(quiet_config());
    let (link, device) = Link::memory(4096);
    let (log, _task) = spawn_device(device, |_, _| Vec::new());
    driver.attach(link).await.unwrap();

    let outcome = driver
        .send(&SendRequest::new(3, vec![20u8]).with_needs_ack(false))
        .await;
    assert!(matches!(outcome, SendOutcome::Sent { .. }));
    assert_eq!(driver.pending_commands(), 0);

    wait_until(|| log.lock().unwrap().len() == 1).await;
    let frame = log.lock().unwrap()[0].clone();
    assert!(!frame.needs_ack);
    assert_eq!(frame.payload, Bytes::from_static(&[20]));
}

#[tokio::test]
async fn acknowledged_on_first_attempt() {
    let driver = GimbalDriver::new(quiet_config());
    let (link, device) = Link::memory(4096);
    let (log, _task) = spawn_device(device, ack_all);
    driver.attach(link).await.unwrap();

    let outcome = driver.send_named("center", Bytes::new()).await.unwrap();
    match outcome {
        SendOutcome::Acknowledged {
            sequence,
            attempts,
            reply,
        } => {
            assert_eq!(attempts, 1);
            assert_eq!(reply.sequence, sequence);
            assert!(reply.is_ack);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let state = driver.current_state();
    assert!(state.connected);
    assert!(state.last_ack_timestamp.is_some());
    assert_eq!(state.retry_count, 0);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausts_retries_with_fresh_sequence_numbers() {
    let driver = GimbalDriver::new(quiet_config());
    let (link, device) = Link::memory(4096);
    let (log, _task) = spawn_device(device, |_, _| Vec::new());
    driver.attach(link).await.unwrap();

    let request = SendRequest::new(18, Bytes::new())
        .with_timeout(Duration::from_millis(200))
        .with_max_retries(3);
    let outcome = driver.send(&request).await;
    assert!(matches!(outcome, SendOutcome::Exhausted { attempts: 4 }));

    wait_until(|| log.lock().unwrap().len() == 4).await;
    let sequences: Vec<u16> = log.lock().unwrap().iter().map(|f| f.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
    assert!(log.lock().unwrap().iter().all(|f| f.needs_ack && f.command_id == 18));

    let state = driver.current_state();
    assert_eq!(state.retry_count, 4);
    assert_eq!(driver.pending_commands(), 0);
}

#[tokio::test(start_paused = true)]
async fn late_ack_for_old_attempt_is_ignored() {
    let driver = GimbalDriver::new(quiet_config());
    let (link, device) = Link::memory(4096);
    let (log, _task) = spawn_device(device, |frame, index| {
        if index == 0 {
            return Vec::new();
        }
        // Late ACK for the first attempt, then the real one.
        let mut bytes = wire(&Frame::ack(frame.sequence - 1, frame.command_id, Bytes::new()));
        bytes.extend(ack_all(frame, index));
        bytes
    });
    driver.attach(link).await.unwrap();

    let request = SendRequest::new(6, Bytes::new()).with_timeout(Duration::from_millis(300));
    let outcome = driver.send(&request).await;
    match outcome {
        SendOutcome::Acknowledged {
            sequence, attempts, ..
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(sequence, 2);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(driver.current_state().retry_count, 1);
}

#[tokio::test]
async fn reverse_order_acks_resolve_the_right_waiters() {
    let driver = GimbalDriver::new(quiet_config());
    let (link, device) = Link::memory(4096);
    driver.attach(link).await.unwrap();

    let device = tokio::spawn(async move {
        let (mut rx, mut tx) = tokio::io::split(device);
        let mut reader = FrameReader::new();
        let first = read_frame(&mut rx, &mut reader).await;
        let second = read_frame(&mut rx, &mut reader).await;
        for frame in [&second, &first] {
            let reply = Frame::ack(frame.sequence, frame.command_id, frame.payload.clone());
            write_frame(&mut tx, &reply).await;
        }
        (rx, tx)
    });

    let zoom = SendRequest::new(6, Bytes::from_static(b"zoom")).with_timeout(Duration::from_secs(5));
    let photo = SendRequest::new(12, Bytes::from_static(b"photo")).with_timeout(Duration::from_secs(5));
    let (a, b) = tokio::join!(driver.send(&zoom), driver.send(&photo));

    for (outcome, request) in [(a, &zoom), (b, &photo)] {
        match outcome {
            SendOutcome::Acknowledged {
                sequence,
                attempts,
                reply,
            } => {
                assert_eq!(attempts, 1);
                assert_eq!(reply.sequence, sequence);
                assert_eq!(reply.command_id, request.command_id);
                assert_eq!(reply.payload, request.payload);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(driver.pending_commands(), 0);
    let _halves = device.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn heartbeat_probes_on_cadence_and_stops_on_disconnect() {
    let config = DriverConfig {
        heartbeat: HeartbeatConfig {
            interval: Duration::from_secs(1),
            ..HeartbeatConfig::default()
        },
        ..DriverConfig::default()
    };
    let driver = GimbalDriver::new(config);
    let (link, device) = Link::memory(4096);
    let (log, _task) = spawn_device(device, ack_all);
    driver.attach(link).await.unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let probes = log.lock().unwrap().len();
    assert!((3..=5).contains(&probes), "got {probes} probes");
    assert!(log.lock().unwrap().iter().all(|f| f.command_id == 18 && f.needs_ack));
    assert!(driver.current_state().last_ack_timestamp.is_some());

    driver.disconnect().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(log.lock().unwrap().len(), probes);
    assert!(!driver.is_connected());
}

#[tokio::test]
async fn disconnect_fails_pending_commands() {
    let driver = Arc::new(GimbalDriver::new(quiet_config()));
    let (link, device) = Link::memory(4096);
    let (_log, _task) = spawn_device(device, |_, _| Vec::new());
    driver.attach(link).await.unwrap();

    let sender = {
        let driver = Arc::clone(&driver);
        tokio::spawn(async move {
            let request = SendRequest::new(18, Bytes::new()).with_timeout(Duration::from_secs(60));
            driver.send(&request).await
        })
    };
    wait_until(|| driver.pending_commands() == 1).await;

    driver.disconnect().await;
    let outcome = sender.await.unwrap();
    assert!(matches!(outcome, SendOutcome::Disconnected { .. }));
    assert_eq!(driver.pending_commands(), 0);

    let after = driver.send(&SendRequest::new(18, Bytes::new())).await;
    assert!(matches!(after, SendOutcome::NotConnected));
}

#[tokio::test]
async fn peer_hangup_marks_disconnected() {
    let driver = GimbalDriver::new(quiet_config());
    let (link, device) = Link::memory(4096);
    driver.attach(link).await.unwrap();
    assert!(driver.is_connected());

    drop(device);
    wait_until(|| !driver.is_connected()).await;
    assert_eq!(driver.current_state().error_count, 1);
}

#[tokio::test]
async fn unsolicited_reports_update_state_through_noise() {
    let driver = GimbalDriver::new(quiet_config());
    let (link, device) = Link::memory(4096);
    driver.attach(link).await.unwrap();

    let (_rx, mut tx) = tokio::io::split(device);
    let mut attitude = Vec::new();
    for tenths in [450i16, -200, 15] {
        attitude.extend_from_slice(&tenths.to_le_bytes());
    }

    let mut corrupt = wire(&Frame::new(0, 22, vec![0u8; 6]));
    corrupt[9] ^= 0x01;
    tx.write_all(&[0xde, 0xad]).await.unwrap();
    tx.write_all(&corrupt).await.unwrap();
    write_frame(&mut tx, &Frame::new(0, 22, attitude)).await;
    write_frame(&mut tx, &Frame::new(0, 15, vec![1u8, 4, 0])).await;
    write_frame(&mut tx, &Frame::new(0, 99, vec![1u8])).await;

    wait_until(|| driver.current_state().record_state == RecordState::Recording).await;
    let state = driver.current_state();
    assert_eq!(state.yaw, 45.0);
    assert_eq!(state.pitch, -20.0);
    assert_eq!(state.roll, 1.5);
    assert!(state.connected);
}

#[tokio::test]
async fn reconnect_keeps_state_and_resets_counters() {
    let driver = GimbalDriver::new(quiet_config());
    let (link, device) = Link::memory(4096);
    driver.attach(link).await.unwrap();
    drop(device);
    wait_until(|| !driver.is_connected()).await;
    assert_eq!(driver.current_state().error_count, 1);

    let (link, device) = Link::memory(4096);
    let (_log, _task) = spawn_device(device, ack_all);
    driver.attach(link).await.unwrap();
    let state = driver.current_state();
    assert!(state.connected);
    assert_eq!(state.error_count, 0);

    assert!(
        driver
            .send_cmd(0, Bytes::new(), true, Duration::from_secs(1), 0)
            .await
    );
}

#[tokio::test]
async fn refused_datagrams_do_not_drop_the_link() {
    let vacant = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = vacant.local_addr().unwrap();
    drop(vacant);

    let driver = GimbalDriver::new(quiet_config());
    driver.connect(&Endpoint::udp(addr)).await.unwrap();

    let request = SendRequest::new(18, Bytes::new())
        .with_timeout(Duration::from_millis(300))
        .with_max_retries(2);
    let outcome = driver.send(&request).await;

    assert!(matches!(outcome, SendOutcome::Exhausted { attempts: 3 }), "{outcome:?}");
    assert!(driver.is_connected());
    let state = driver.current_state();
    assert!(state.connected);
    assert_eq!(state.retry_count, 3);
    driver.disconnect().await;
}

#[tokio::test]
async fn large_acks_survive_datagram_links() {
    const REPLY_SIZE: usize = 5000;

    let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = device.local_addr().unwrap();
    let device = tokio::spawn(async move {
        let mut buf = vec![0u8; 2048];
        for _ in 0..2 {
            let (n, from) = device.recv_from(&mut buf).await.unwrap();
            let (query, _) = decode_frame(&buf[..n]);
            let query = query.expect("driver sends whole frames");
            let reply = wire(&Frame::ack(query.sequence, query.command_id, vec![0xA5; REPLY_SIZE]));

            // A cut-off frame in its own datagram must not swallow the real reply.
            device.send_to(&reply[..20], from).await.unwrap();
            device.send_to(&reply, from).await.unwrap();
        }
    });

    let driver = GimbalDriver::new(quiet_config());
    driver.connect(&Endpoint::udp(addr)).await.unwrap();

    for _ in 0..2 {
        let request = SendRequest::new(15, Bytes::new())
            .with_timeout(Duration::from_secs(2))
            .with_max_retries(0);
        let outcome = driver.send(&request).await;
        let reply = outcome.reply().expect("large ack should be matched");
        assert_eq!(reply.payload.len(), REPLY_SIZE);
    }

    device.await.unwrap();
    assert_eq!(driver.current_state().error_count, 0);
    driver.disconnect().await;
}
