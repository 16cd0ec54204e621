use crate::api::OtaStatusBody;
use crate::error::ProvisionError;
use crate::firmware::*;
use proptest::prelude::*;

fn manager(capacity: usize) -> FirmwareUpdateManager<MemorySlot, MemoryBootControl> {
    FirmwareUpdateManager::new(MemorySlot::new(capacity), MemoryBootControl::new())
}

#[test]
fn test_fill_slot_exactly_then_overflow() {
    let mut ota = manager(4096);

    ota.start().unwrap();
    ota.write(&[0xA5; 2048]).unwrap();
    assert_eq!(ota.status().bytes_written, 2048);
    ota.write(&[0x5A; 2048]).unwrap();
    assert_eq!(ota.status().bytes_written, 4096);

    assert_eq!(ota.write(&[0]), Err(ProvisionError::CapacityExceeded));
    assert_eq!(ota.status().bytes_written, 4096);

    let staged = ota.finish().unwrap();
    assert_eq!(staged.size, 4096);
    assert_eq!(ota.status().state, UpdateState::Idle);
    assert_eq!(ota.boot().test_boot_requests(), 1);
}

#[test]
fn test_finish_without_writes() {
    let mut ota = manager(4096);
    ota.start().unwrap();

    assert_eq!(ota.finish(), Err(ProvisionError::EmptyImage));
    assert_eq!(ota.status().state, UpdateState::Idle);
    assert_eq!(ota.finish(), Err(ProvisionError::NotInProgress));
    assert_eq!(ota.boot().test_boot_requests(), 0);
}

#[test]
fn test_start_twice() {
    let mut ota = manager(4096);
    ota.start().unwrap();
    ota.write(&[1; 100]).unwrap();

    assert_eq!(ota.start(), Err(ProvisionError::AlreadyInProgress));
    assert_eq!(ota.status().bytes_written, 100);
    assert_eq!(ota.slot().erase_count(), 1);
}

#[test]
fn test_status_is_side_effect_free() {
    let mut ota = manager(64);
    ota.start().unwrap();
    ota.write(&[1; 10]).unwrap();

    let first = ota.status();
    let second = ota.status();
    assert_eq!(first, second);
    assert_eq!(
        OtaStatusBody::from(first),
        OtaStatusBody::Updating { bytes_written: 10 }
    );
}

#[test]
fn test_upload_recovers_after_overflow_abort() {
    let mut ota = manager(8);
    ota.start().unwrap();
    assert_eq!(ota.write(&[1; 9]), Err(ProvisionError::CapacityExceeded));
    ota.abort().unwrap();

    ota.start().unwrap();
    ota.write(&[2; 8]).unwrap();
    assert_eq!(ota.finish().unwrap().size, 8);
    assert_eq!(ota.slot().contents(), &[2; 8]);
}

proptest! {
    #[test]
    fn prop_bytes_written_stays_within_capacity(
        capacity in 1usize..2048,
        chunks in prop::collection::vec(0usize..512, 0..24),
    ) {
        let mut ota = manager(capacity);
        ota.start().unwrap();
        prop_assert_eq!(ota.status().bytes_written, 0);

        let mut expected = 0usize;
        for len in chunks {
            let before = ota.status().bytes_written;
            match ota.write(&vec![0x42; len]) {
                Ok(()) => expected += len,
                Err(e) => prop_assert_eq!(e, ProvisionError::CapacityExceeded),
            }
            let after = ota.status().bytes_written;
            prop_assert!(after >= before);
            prop_assert!(after <= capacity);
            prop_assert_eq!(after, expected);
            prop_assert_eq!(ota.status().state, UpdateState::Updating);
        }

        ota.abort().unwrap();
        ota.start().unwrap();
        prop_assert_eq!(ota.status().bytes_written, 0);
    }
}
