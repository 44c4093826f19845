//! The low-power flag lives in the NVS data partition
//!
//! Flash survives power loss, unlike the retained region. Nothing else on
//! this device uses NVS, so the first bytes of the partition are ours.

use esp_bootloader_esp_idf::partitions::{self, DataPartitionSubType, FlashRegion, PartitionType};
use esp_hal::peripherals::FLASH;
use esp_storage::FlashStorage;
use static_cell::StaticCell;
use thiserror_no_std::Error;

static FLASH_STORAGE: StaticCell<FlashStorage<'static>> = StaticCell::new();
static PT_MEM: StaticCell<[u8; partitions::PARTITION_TABLE_MAX_LEN]> = StaticCell::new();

pub type FlagPartition = FlashRegion<'static, FlashStorage<'static>>;

#[derive(Debug, Error)]
pub enum FlagPartitionError {
    #[error("partition table unreadable: {0:?}")]
    Table(partitions::Error),
    #[error("no NVS partition in the partition table")]
    Missing,
}

/// Open the flash region backing the power-mode flag
pub fn open(flash: FLASH<'static>) -> Result<FlagPartition, FlagPartitionError> {
    let flash = FLASH_STORAGE.init(FlashStorage::new(flash));
    let pt_mem = PT_MEM.init([0u8; partitions::PARTITION_TABLE_MAX_LEN]);

    let table = partitions::read_partition_table(flash, pt_mem).map_err(FlagPartitionError::Table)?;
    let entry = table
        .find_partition(PartitionType::Data(DataPartitionSubType::Nvs))
        .map_err(FlagPartitionError::Table)?
        .ok_or(FlagPartitionError::Missing)?;

    Ok(entry.as_embedded_storage(flash))
}
