//! Memory unit: instruction fetch, data load/store, optional cache (§4.7).
//!
//! Instruction fetch is combinational and zero-latency (icache is
//! out-of-scope, per this simulator's own open-question resolution: the
//! fetch/data-memory latency asymmetry in the source is preserved). Data
//! accesses go through a single in-flight request slot latched the same way
//! `original_source/ALU.hpp`'s `ALU` latches its tag/result — accept a new
//! request only while idle, publish on the CDB once the configured delay
//! elapses, then idle again once the CDB carries that tag back.
//!
//! `original_source/memory.hpp`'s `Memory` class is a single-port,
//! zero-latency byte array; it does not model the cache or the
//! tag/countdown pipeline described in §4.7, since that source predates
//! this simulator's richer memory model. Its hex-dump-stdin constructor and
//! flat byte-map storage are what's actually carried forward here (see
//! [`PlainMemory::new`] / [`crate::image::MemoryImage`]); the cache and
//! latency queue are built from this crate's own §4.7 prose, with
//! replacement-policy style (explicit `CacheLine`/sets/ways) grounded on
//! `examples/willmccallion-rvsim/src/cpu/cache.rs`.

use std::collections::HashMap;

use rand::Rng;

use crate::bus::{CdbPacket, MemRequest, StoreCommit};
use crate::error::SimError;
use crate::image::MemoryImage;
use crate::substrate::Reg;

/// Sign/zero-extension width encoding shared by loads and stores (§4.7).
fn width_bytes(subop: u8) -> u32 {
    match subop & 0b011 {
        0b00 => 1,
        0b01 => 2,
        _ => 4,
    }
}

fn sign_extends(subop: u8) -> bool {
    subop & 0b100 == 0
}

/// Reads `width` bytes at `address` from a sparse byte map, assembling a
/// little-endian word and applying §4.7's sign/zero extension.
fn load_bytes(bytes: &HashMap<u32, u8>, address: u32, subop: u8) -> u32 {
    let width = width_bytes(subop);
    let mut raw = 0u32;
    for i in 0..width {
        let b = *bytes.get(&address.wrapping_add(i)).unwrap_or(&0);
        raw |= u32::from(b) << (8 * i);
    }
    if sign_extends(subop) && width < 4 {
        let shift = 32 - width * 8;
        ((raw << shift) as i32 >> shift) as u32
    } else {
        raw
    }
}

fn store_bytes(bytes: &mut HashMap<u32, u8>, address: u32, subop: u8, data: u32) {
    let width = width_bytes(subop);
    for i in 0..width {
        bytes.insert(address.wrapping_add(i), (data >> (8 * i)) as u8);
    }
}

/// Flat, sparse, byte-addressed backing store shared by plain memory and
/// the cache's fill path.
#[derive(Clone, Debug, Default)]
struct Backing {
    bytes: HashMap<u32, u8>,
}

impl Backing {
    fn from_image(image: &MemoryImage) -> Self {
        Self {
            bytes: image.bytes().clone(),
        }
    }

    fn fetch_word(&self, pc: u32) -> u32 {
        load_bytes(&self.bytes, pc, 0b010)
    }

    fn read(&self, address: u32, subop: u8) -> u32 {
        load_bytes(&self.bytes, address, subop)
    }

    fn write(&mut self, address: u32, subop: u8, data: u32) {
        store_bytes(&mut self.bytes, address, subop, data);
    }
}

/// Parameters for the set-associative write-through cache (§4.7).
#[derive(Clone, Copy, Debug)]
pub struct CacheParams {
    /// Set-index bits (`s`): `2^s` sets.
    pub set_bits: u32,
    /// Ways per set (`E`).
    pub ways: usize,
    /// Block-offset bits (`b`): `2^b`-byte blocks.
    pub block_bits: u32,
    /// Latency on a hit.
    pub hit_delay: u32,
    /// Latency on a miss.
    pub miss_delay: u32,
}

#[derive(Clone, Debug)]
struct CacheLine {
    valid: bool,
    tag: u32,
    data: Vec<u8>,
}

struct Cache {
    params: CacheParams,
    lines: Vec<CacheLine>,
}

impl Cache {
    fn new(params: CacheParams) -> Self {
        let sets = 1usize << params.set_bits;
        let block = 1usize << params.block_bits;
        let lines = vec![
            CacheLine {
                valid: false,
                tag: 0,
                data: vec![0; block],
            };
            sets * params.ways
        ];
        Self { params, lines }
    }

    fn block_size(&self) -> u32 {
        1u32 << self.params.block_bits
    }

    fn split(&self, address: u32) -> (u32, usize, u32) {
        let block_offset = address & (self.block_size() - 1);
        let set_index = (address >> self.params.block_bits) & ((1u32 << self.params.set_bits) - 1);
        let tag = address >> (self.params.set_bits + self.params.block_bits);
        (tag, set_index as usize, block_offset)
    }

    fn find_way(&self, set_index: usize, tag: u32) -> Option<usize> {
        let base = set_index * self.params.ways;
        (0..self.params.ways).find(|&w| {
            let line = &self.lines[base + w];
            line.valid && line.tag == tag
        })
    }

    /// Returns `(hit, delay, way)`. On a miss, fills the line from `backing`
    /// first (write-through misses must load the rest of the block). The
    /// returned way is the one a same-address [`Cache::read_line_at`] call
    /// must use, so callers never need to re-derive it via [`Cache::find_way`].
    fn access(&mut self, backing: &Backing, address: u32, width: u32) -> Result<(bool, u32, usize), SimError> {
        let (tag, set_index, offset) = self.split(address);
        if offset + width > self.block_size() {
            return Err(SimError::CacheBlockCrossing { address, width });
        }

        if let Some(way) = self.find_way(set_index, tag) {
            return Ok((true, self.params.hit_delay, way));
        }

        let base = set_index * self.params.ways;
        let way = (0..self.params.ways)
            .find(|&w| !self.lines[base + w].valid)
            .unwrap_or_else(|| rand::thread_rng().gen_range(0..self.params.ways));

        let block_base = address - offset;
        let block = self.block_size();
        let mut data = vec![0u8; block as usize];
        for i in 0..block {
            data[i as usize] = *backing.bytes.get(&(block_base + i)).unwrap_or(&0);
        }
        self.lines[base + way] = CacheLine { valid: true, tag, data };

        Ok((false, self.params.miss_delay, way))
    }

    /// Reads `subop`'s width out of the line at `way`, which the caller must
    /// have just obtained from [`Cache::access`] for this same `address`.
    fn read_line_at(&self, way: usize, address: u32, subop: u8) -> u32 {
        let (_, set_index, offset) = self.split(address);
        let line = &self.lines[set_index * self.params.ways + way];
        let width = width_bytes(subop);
        let mut raw = 0u32;
        for i in 0..width {
            raw |= u32::from(line.data[(offset + i) as usize]) << (8 * i);
        }
        if sign_extends(subop) && width < 4 {
            let shift = 32 - width * 8;
            ((raw << shift) as i32 >> shift) as u32
        } else {
            raw
        }
    }

    fn write_line(&mut self, address: u32, subop: u8, data: u32) {
        let (tag, set_index, offset) = self.split(address);
        let Some(way) = self.find_way(set_index, tag) else {
            return;
        };
        let line = &mut self.lines[set_index * self.params.ways + way];
        let width = width_bytes(subop);
        for i in 0..width {
            line.data[(offset + i) as usize] = (data >> (8 * i)) as u8;
        }
    }
}

/// The in-flight request slot shared by plain memory and the cache: a load
/// or store address/width/tag latched until its delay counts down and its
/// CDB broadcast is acknowledged.
#[derive(Clone, Copy, Debug, Default)]
struct Pending {
    tag: u32,
    remaining: u32,
    result: u32,
}

/// The memory unit: instruction fetch plus one in-flight data request,
/// optionally backed by a set-associative write-through cache.
pub struct Memory {
    backing: Backing,
    cache: Option<Cache>,
    pending: Reg<Pending>,
    in_flight: Reg<bool>,
    /// Constant per-access delay used when no cache is configured.
    plain_delay: u32,
    last_cache_hit: Option<bool>,
}

impl Memory {
    /// Builds plain (uncached) memory over the given image.
    pub fn plain(image: &MemoryImage, delay: u32) -> Self {
        Self {
            backing: Backing::from_image(image),
            cache: None,
            pending: Reg::default(),
            in_flight: Reg::default(),
            plain_delay: delay,
            last_cache_hit: None,
        }
    }

    /// Builds cached memory over the given image.
    pub fn cached(image: &MemoryImage, params: CacheParams) -> Self {
        Self {
            backing: Backing::from_image(image),
            cache: Some(Cache::new(params)),
            pending: Reg::default(),
            in_flight: Reg::default(),
            plain_delay: 0,
            last_cache_hit: None,
        }
    }

    /// Combinational, zero-latency instruction fetch.
    pub fn fetch(&self, pc: u32) -> u32 {
        self.backing.fetch_word(pc)
    }

    /// The CDB broadcast this unit is currently the source for.
    pub fn cdb_out(&self) -> CdbPacket {
        let pending = *self.pending.get();
        if *self.in_flight.get() && pending.remaining == 0 {
            CdbPacket {
                tag: pending.tag,
                data: pending.result,
            }
        } else {
            CdbPacket::NONE
        }
    }

    /// Computes next-cycle state. `request` is a new Mem-class station's
    /// request this cycle (ignored while a request is already in flight —
    /// the caller must gate issuance of a new Mem-class RS the same way the
    /// ALU-class pairing does, by only offering one request at a time from
    /// a station whose readiness already serializes through this unit);
    /// `cdb` is this cycle's arbitrated broadcast; `clear` is the flush
    /// decision.
    pub fn pull(&mut self, request: Option<MemRequest>, cdb: CdbPacket, clear: bool) -> Result<(), SimError> {
        let cur = *self.pending.get();
        let was_in_flight = *self.in_flight.get();

        if clear {
            self.pending.set_next(Pending::default());
            self.in_flight.set_next(false);
            return Ok(());
        }

        if was_in_flight {
            if cur.remaining == 0 {
                let next_in_flight = cdb.tag != cur.tag;
                self.in_flight.set_next(next_in_flight);
                self.pending.set_next(cur);
            } else {
                let mut next = cur;
                next.remaining -= 1;
                self.in_flight.set_next(true);
                self.pending.set_next(next);
            }
            return Ok(());
        }

        match request {
            Some(r) if r.tag != 0 => {
                let width = width_bytes(r.subop);
                let (delay, result, hit) = if let Some(cache) = &mut self.cache {
                    let (hit, delay, way) = cache.access(&self.backing, r.address, width)?;
                    (delay, cache.read_line_at(way, r.address, r.subop), Some(hit))
                } else {
                    (self.plain_delay, self.backing.read(r.address, r.subop), None)
                };
                self.last_cache_hit = hit;

                self.pending.set_next(Pending {
                    tag: r.tag,
                    remaining: delay,
                    result,
                });
                self.in_flight.set_next(true);
            }
            _ => {
                self.last_cache_hit = None;
                self.pending.set_next(cur);
                self.in_flight.set_next(false);
            }
        }
        Ok(())
    }

    /// The cache outcome (`Some(hit)`) of the request installed by the most
    /// recent [`Memory::pull`] call, or `None` if no request started that
    /// cycle or no cache is configured. Read by the CPU driver after
    /// `update()` to feed [`crate::stats::Stats::record_cache_access`].
    pub fn last_cache_hit(&self) -> Option<bool> {
        self.last_cache_hit
    }

    /// Commits the state staged by [`Memory::pull`].
    pub fn update(&mut self) {
        self.pending.update();
        self.in_flight.update();
    }

    /// Retires a store at ROB commit: writes through the cache (if present)
    /// and always to backing memory.
    pub fn commit_store(&mut self, store: StoreCommit) {
        if let Some(cache) = &mut self.cache {
            cache.write_line(store.address, store.width, store.data);
        }
        self.backing.write(store.address, store.width, store.data);
    }
}
