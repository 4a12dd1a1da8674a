//! End-to-end tests driving the emulator through the adapter surface
//!
//! These exercise the full path a hosting controller would take: submit a
//! task, let interpretation run, and receive the completion from the
//! dispatcher thread.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use scsi_emulator::sense::{asc, scsi_status};
use scsi_emulator::{
    EmulatorAdapter, EmulatorTask, ServiceResponse, TaskCompletion, TransferDirection,
};

const DISK_SIZE: u64 = 1024 * 1024; // 2048 blocks

fn test_adapter() -> EmulatorAdapter {
    let _ = env_logger::builder().is_test(true).try_init();
    EmulatorAdapter::builder()
        .disk_size(DISK_SIZE)
        .build()
        .expect("failed to build adapter")
}

fn task(task_id: u64, cdb: Vec<u8>, direction: TransferDirection, buffer: Vec<u8>) -> EmulatorTask {
    EmulatorTask {
        task_id,
        target: 0,
        lun: 0,
        cdb,
        direction,
        buffer,
    }
}

fn submit_and_wait(adapter: &EmulatorAdapter, task: EmulatorTask) -> TaskCompletion {
    let (tx, rx) = mpsc::channel();
    adapter.submit(
        task,
        Box::new(move |completion| {
            tx.send(completion).expect("completion receiver dropped");
        }),
    );
    rx.recv().expect("no completion delivered")
}

#[test]
fn test_inquiry_round_trip() {
    let adapter = test_adapter();
    let completion = submit_and_wait(
        &adapter,
        task(
            1,
            vec![0x12, 0, 0, 0, 36, 0],
            TransferDirection::FromTarget,
            vec![0u8; 36],
        ),
    );
    assert_eq!(completion.response, ServiceResponse::TaskComplete);
    assert_eq!(completion.status.status_byte(), scsi_status::GOOD);
    assert_eq!(completion.transferred, 36);
    assert_eq!(&completion.data[8..16], b"AppleDTS");
}

#[test]
fn test_read_capacity_reports_disk_geometry() {
    let adapter = test_adapter();
    let completion = submit_and_wait(
        &adapter,
        task(
            1,
            vec![0x25, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            TransferDirection::FromTarget,
            vec![0u8; 8],
        ),
    );
    assert_eq!(completion.transferred, 8);
    let max_lba = u32::from_be_bytes(completion.data[0..4].try_into().unwrap());
    let block_len = u32::from_be_bytes(completion.data[4..8].try_into().unwrap());
    assert_eq!(max_lba as u64, DISK_SIZE / 512 - 1);
    assert_eq!(block_len, 512);
}

#[test]
fn test_write_then_read_round_trip() {
    let adapter = test_adapter();
    let pattern: Vec<u8> = (0..4 * 512).map(|i| (i % 253) as u8).collect();

    // WRITE(10) at LBA 16, 4 blocks
    let completion = submit_and_wait(
        &adapter,
        task(
            1,
            vec![0x2A, 0, 0, 0, 0, 16, 0, 0, 4, 0],
            TransferDirection::ToTarget,
            pattern.clone(),
        ),
    );
    assert_eq!(completion.status.status_byte(), scsi_status::GOOD);
    assert_eq!(completion.transferred, 4 * 512);

    // READ(10) back from the same LBA
    let completion = submit_and_wait(
        &adapter,
        task(
            2,
            vec![0x28, 0, 0, 0, 0, 16, 0, 0, 4, 0],
            TransferDirection::FromTarget,
            vec![0u8; 4 * 512],
        ),
    );
    assert_eq!(completion.status.status_byte(), scsi_status::GOOD);
    assert_eq!(completion.data, pattern);
}

#[test]
fn test_read6_zero_length_transfers_256_blocks() {
    let adapter = test_adapter();
    let completion = submit_and_wait(
        &adapter,
        task(
            1,
            vec![0x08, 0, 0, 0, 0, 0],
            TransferDirection::FromTarget,
            vec![0u8; 256 * 512],
        ),
    );
    assert_eq!(completion.status.status_byte(), scsi_status::GOOD);
    assert_eq!(completion.transferred, 256 * 512);

    // With a smaller buffer the transfer clips and stays GOOD
    let completion = submit_and_wait(
        &adapter,
        task(
            2,
            vec![0x08, 0, 0, 0, 0, 0],
            TransferDirection::FromTarget,
            vec![0u8; 8 * 512],
        ),
    );
    assert_eq!(completion.status.status_byte(), scsi_status::GOOD);
    assert_eq!(completion.transferred, 8 * 512);
}

#[test]
fn test_unsupported_lun_answers_no_device() {
    let adapter = test_adapter();
    let mut t = task(
        1,
        vec![0x00, 0, 0, 0, 36, 0],
        TransferDirection::FromTarget,
        vec![0xAAu8; 64],
    );
    t.lun = 3;
    let completion = submit_and_wait(&adapter, t);

    assert_eq!(completion.response, ServiceResponse::TaskComplete);
    assert_eq!(completion.status.status_byte(), scsi_status::CHECK_CONDITION);
    let sense = completion.status.sense().expect("sense data expected");
    assert_eq!(sense.asc, asc::LOGICAL_UNIT_NOT_SUPPORTED);
    assert_eq!(completion.transferred, 36);
    assert_eq!(completion.data[0], 0x7F); // Qualifier not supported, unknown type
}

#[test]
fn test_unsupported_lun_inquiry_is_exempt() {
    let adapter = test_adapter();
    let mut t = task(
        1,
        vec![0x12, 0, 0, 0, 36, 0],
        TransferDirection::FromTarget,
        vec![0u8; 36],
    );
    t.lun = 3;
    let completion = submit_and_wait(&adapter, t);
    assert_eq!(completion.status.status_byte(), scsi_status::GOOD);
    assert_eq!(&completion.data[8..16], b"AppleDTS");
}

#[test]
fn test_report_luns_declared_length_matches_entries() {
    let adapter = test_adapter();
    for select_report in [0u8, 1, 2] {
        let completion = submit_and_wait(
            &adapter,
            task(
                select_report as u64,
                vec![0xA0, 0, select_report, 0, 0, 0, 0, 0, 0, 64, 0, 0],
                TransferDirection::FromTarget,
                vec![0u8; 64],
            ),
        );
        assert_eq!(completion.status.status_byte(), scsi_status::GOOD);
        let list_len = u32::from_be_bytes(completion.data[0..4].try_into().unwrap());
        let entries = (completion.transferred as usize - 8) / 8;
        assert_eq!(list_len as usize, 8 * entries);
    }

    let completion = submit_and_wait(
        &adapter,
        task(
            9,
            vec![0xA0, 0, 0x7F, 0, 0, 0, 0, 0, 0, 64, 0, 0],
            TransferDirection::FromTarget,
            vec![0u8; 64],
        ),
    );
    let sense = completion.status.sense().expect("sense data expected");
    assert_eq!(sense.asc, asc::INVALID_COMMAND_OPERATION_CODE);
}

#[test]
fn test_sense_family_stays_unimplemented() {
    // REQUEST SENSE and MODE SENSE are intentionally not emulated; they
    // must keep answering INVALID COMMAND.
    let adapter = test_adapter();
    let cdbs: [&[u8]; 3] = [
        &[0x03, 0, 0, 0, 18, 0],
        &[0x1A, 0, 0x3F, 0, 255, 0],
        &[0x5A, 0, 0x3F, 0, 0, 0, 0, 0, 255, 0],
    ];
    for (id, cdb) in cdbs.iter().enumerate() {
        let completion = submit_and_wait(
            &adapter,
            task(
                id as u64,
                cdb.to_vec(),
                TransferDirection::FromTarget,
                vec![0u8; 255],
            ),
        );
        let sense = completion.status.sense().expect("sense data expected");
        assert_eq!(sense.asc, asc::INVALID_COMMAND_OPERATION_CODE);
        assert_eq!(completion.transferred, 0);
    }
}

#[test]
fn test_unbound_target_fails_without_sense() {
    let adapter = test_adapter();
    let mut t = task(
        1,
        vec![0x00, 0, 0, 0, 0, 0],
        TransferDirection::None,
        Vec::new(),
    );
    t.target = 200;
    let completion = submit_and_wait(&adapter, t);
    assert_eq!(completion.response, ServiceResponse::DeliveryFailure);
    assert!(completion.status.sense().is_none());
}

#[test]
fn test_completions_arrive_in_submission_order() {
    let adapter = test_adapter();
    let (tx, rx) = mpsc::channel();

    for id in 0..50u64 {
        let tx = tx.clone();
        adapter.submit(
            task(
                id,
                vec![0x00, 0, 0, 0, 0, 0],
                TransferDirection::None,
                Vec::new(),
            ),
            Box::new(move |completion| {
                tx.send(completion.task_id).expect("receiver dropped");
            }),
        );
    }
    drop(tx);
    adapter.wait_idle();

    let order: Vec<u64> = rx.try_iter().collect();
    assert_eq!(order, (0..50).collect::<Vec<u64>>());
}

#[test]
fn test_concurrent_producers_on_separate_targets() {
    let _ = env_logger::builder().is_test(true).try_init();
    let adapter = Arc::new(
        EmulatorAdapter::builder()
            .target_count(4)
            .disk_size(DISK_SIZE)
            .build()
            .expect("failed to build adapter"),
    );

    let mut producers = Vec::new();
    for target in 0..4u32 {
        let adapter = Arc::clone(&adapter);
        producers.push(thread::spawn(move || {
            let fill = target as u8 + 1;
            let (tx, rx) = mpsc::channel();

            // Write a target-specific pattern, then read it back
            let tx_w = tx.clone();
            adapter.submit(
                EmulatorTask {
                    task_id: target as u64,
                    target,
                    lun: 0,
                    cdb: vec![0x2A, 0, 0, 0, 0, 0, 0, 0, 1, 0],
                    direction: TransferDirection::ToTarget,
                    buffer: vec![fill; 512],
                },
                Box::new(move |completion| {
                    tx_w.send(completion).expect("receiver dropped");
                }),
            );
            adapter.submit(
                EmulatorTask {
                    task_id: target as u64 + 100,
                    target,
                    lun: 0,
                    cdb: vec![0x28, 0, 0, 0, 0, 0, 0, 0, 1, 0],
                    direction: TransferDirection::FromTarget,
                    buffer: vec![0u8; 512],
                },
                Box::new(move |completion| {
                    tx.send(completion).expect("receiver dropped");
                }),
            );

            let write_done = rx.recv().expect("no write completion");
            let read_done = rx.recv().expect("no read completion");
            assert_eq!(write_done.status.status_byte(), scsi_status::GOOD);
            assert_eq!(read_done.status.status_byte(), scsi_status::GOOD);
            assert!(read_done.data.iter().all(|&b| b == fill));
        }));
    }
    for handle in producers {
        handle.join().expect("producer panicked");
    }
}
