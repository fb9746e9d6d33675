use std::env;
use std::fs;
use std::process;

use ps1_memcard::{BlockType, MemoryCard};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example inspect -- <path-to-memcard>");
        process::exit(1);
    });

    let data = fs::read(&path)?;
    let card = MemoryCard::open(&data, false)?;
    eprintln!("{} card, {:?}", card.format(), card.stats());

    for slot in card.slots() {
        if slot.block_type == BlockType::Formatted {
            continue;
        }
        eprintln!(
            "{:2} {:<16} next={:02X} {:<20} {}",
            slot.index,
            slot.block_type.to_string(),
            slot.next_slot,
            slot.name,
            slot.title_lossy()
        );
        if slot.block_type.is_save_start() {
            let chain = card.find_save_links(slot.index)?;
            eprintln!("   chain {:?}{}", chain.slots, if chain.partial { " (partial)" } else { "" });
        }
    }

    Ok(())
}
