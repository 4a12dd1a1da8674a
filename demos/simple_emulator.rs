//! Walk an emulated SCSI target through a typical discovery and I/O sequence
//!
//! Run with: cargo run --example simple_emulator

use std::sync::mpsc;

use scsi_emulator::{
    EmulatorAdapter, EmulatorTask, ScsiResult, TaskCompletion, TransferDirection,
};

fn submit(adapter: &EmulatorAdapter, task: EmulatorTask) -> TaskCompletion {
    let (tx, rx) = mpsc::channel();
    adapter.submit(
        task,
        Box::new(move |completion| {
            let _ = tx.send(completion);
        }),
    );
    rx.recv().expect("completion dispatcher gone")
}

fn main() -> ScsiResult<()> {
    env_logger::init();

    let adapter = EmulatorAdapter::builder()
        .target_count(1)
        .disk_size(20 * 1024 * 1024)
        .build()?;

    // INQUIRY: who is this device?
    let completion = submit(
        &adapter,
        EmulatorTask {
            task_id: 1,
            target: 0,
            lun: 0,
            cdb: vec![0x12, 0, 0, 0, 36, 0],
            direction: TransferDirection::FromTarget,
            buffer: vec![0u8; 36],
        },
    );
    println!(
        "INQUIRY: vendor={:?} product={:?}",
        String::from_utf8_lossy(&completion.data[8..16]),
        String::from_utf8_lossy(&completion.data[16..32]),
    );

    // READ CAPACITY: how big is it?
    let completion = submit(
        &adapter,
        EmulatorTask {
            task_id: 2,
            target: 0,
            lun: 0,
            cdb: vec![0x25, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            direction: TransferDirection::FromTarget,
            buffer: vec![0u8; 8],
        },
    );
    let max_lba = u32::from_be_bytes(completion.data[0..4].try_into().unwrap());
    let block_len = u32::from_be_bytes(completion.data[4..8].try_into().unwrap());
    println!("READ CAPACITY: {} blocks of {} bytes", max_lba as u64 + 1, block_len);

    // WRITE(10) a block of text at LBA 0, then READ(10) it back
    let mut payload = b"hello from the emulated disk".to_vec();
    payload.resize(512, 0);
    let completion = submit(
        &adapter,
        EmulatorTask {
            task_id: 3,
            target: 0,
            lun: 0,
            cdb: vec![0x2A, 0, 0, 0, 0, 0, 0, 0, 1, 0],
            direction: TransferDirection::ToTarget,
            buffer: payload,
        },
    );
    println!("WRITE(10): {} bytes, status 0x{:02X}", completion.transferred, completion.status.status_byte());

    let completion = submit(
        &adapter,
        EmulatorTask {
            task_id: 4,
            target: 0,
            lun: 0,
            cdb: vec![0x28, 0, 0, 0, 0, 0, 0, 0, 1, 0],
            direction: TransferDirection::FromTarget,
            buffer: vec![0u8; 512],
        },
    );
    let text_end = completion.data.iter().position(|&b| b == 0).unwrap_or(512);
    println!(
        "READ(10): {:?}",
        String::from_utf8_lossy(&completion.data[..text_end])
    );

    adapter.wait_idle();
    Ok(())
}
