// Lumen RPU Info Tool
// Copyright (c) 2019-2024 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use log::{info, warn, LevelFilter};

use lumen_codec_dovi::container::{unwrap_nal, unwrap_t35};
use lumen_codec_dovi::{guess_profile_hevc, DoviContext, DoviMetadata, GenerateFlags};
use lumen_core::codecs::ErrorRecognition;
use lumen_core::errors::Result;
use lumen_core::video::dovi::DoviCompression;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Compression {
    None,
    Limited,
    Extended,
}

impl From<Compression> for DoviCompression {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => DoviCompression::None,
            Compression::Limited => DoviCompression::Limited,
            Compression::Extended => DoviCompression::Extended,
        }
    }
}

/// Print the contents of Dolby Vision RPUs. Files are treated as consecutive RPUs of one stream.
#[derive(Parser, Debug)]
#[command(name = "lumen-rpu-info", version, long_about = None)]
struct Args {
    /// RPU files, in stream order
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// The Dolby Vision profile of the stream (guessed if not set)
    #[arg(long, value_name = "N")]
    profile: Option<u8>,

    /// The metadata compression of the stream
    #[arg(long, value_enum, default_value = "none")]
    compression: Compression,

    /// Inputs are complete NAL units with emulation prevention
    #[arg(long, conflicts_with = "t35")]
    nal: bool,

    /// Inputs are ITU-T T.35 payloads (AV1)
    #[arg(long)]
    t35: bool,

    /// Verify the CRC of each RPU
    #[arg(long)]
    verify_crc: bool,

    /// Reject RPUs that are decodable but non-compliant
    #[arg(long)]
    strict: bool,

    /// Regenerate each RPU from its metadata and verify it parses back identically
    #[arg(long)]
    roundtrip: bool,

    /// Increase verbosity
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn err_recognition(&self) -> ErrorRecognition {
        let mut er = ErrorRecognition::empty();

        if self.verify_crc {
            er |= ErrorRecognition::CRCCHECK;
        }

        if self.strict {
            er |= ErrorRecognition::COMPLIANT | ErrorRecognition::EXPLODE;
        }

        er
    }
}

fn print_metadata(metadata: &DoviMetadata) {
    let hdr = &metadata.header;

    println!("  Header:");
    println!("    RPU Format:          0x{:03x}", hdr.rpu_format);
    println!("    VDR RPU Profile:     {}", hdr.vdr_rpu_profile);
    println!("    VDR RPU Level:       {}", hdr.vdr_rpu_level);
    println!("    Guessed Profile:     {}", guess_profile_hevc(hdr));
    println!("    Coefficient Type:    {}", hdr.coef_data_type);
    println!("    Coefficient Denom:   2^{}", hdr.coef_log2_denom);
    println!(
        "    Bit Depths:          BL {}, EL {}, VDR {}",
        hdr.bl_bit_depth, hdr.el_bit_depth, hdr.vdr_bit_depth
    );
    println!("    BL Full Range:       {}", hdr.bl_video_full_range_flag);
    println!("    Residual Disabled:   {}", hdr.disable_residual_flag);

    let mapping = &metadata.mapping;

    println!("  Mapping:");
    println!("    VDR RPU ID:          {}", mapping.vdr_rpu_id);
    println!(
        "    Partitions:          {}x{}",
        mapping.num_x_partitions, mapping.num_y_partitions
    );

    for (c, curve) in mapping.curves.iter().enumerate() {
        println!("    Component {} Pivots:  {:?}", c, curve.pivots.as_slice());

        for piece in curve.pieces.iter() {
            println!("      {:?}", piece);
        }
    }

    if let Some(method) = mapping.nlq_method_idc {
        println!("    NLQ Method:          {:?}", method);
        println!("    NLQ Pivots:          {:?}", mapping.nlq_pivots);

        for nlq in mapping.nlq.iter() {
            println!("      {:?}", nlq);
        }
    }

    let color = &metadata.color;

    println!("  Color:");
    println!("    DM Metadata ID:      {}", color.dm_metadata_id);
    println!("    Scene Refresh:       {}", color.scene_refresh_flag);
    println!("    Signal EOTF:         {}", color.signal_eotf);
    println!("    Signal Bit Depth:    {}", color.signal_bit_depth);
    println!("    Source Min PQ:       {}", color.source_min_pq);
    println!("    Source Max PQ:       {}", color.source_max_pq);
    println!("    Source Diagonal:     {}", color.source_diagonal);

    if !metadata.ext_blocks.is_empty() {
        println!("  Extension Blocks:");

        for block in metadata.ext_blocks.iter() {
            println!("    L{:<3} {:?}", block.level(), block);
        }
    }
}

/// Regenerates an RPU from `metadata`, and parses it back with a fresh context.
fn roundtrip(dec: &DoviContext, metadata: &DoviMetadata) -> Result<bool> {
    let mut enc = DoviContext::new("roundtrip");
    enc.cfg = dec.cfg;

    if enc.cfg.dv_profile == 0 {
        enc.cfg.dv_profile = match guess_profile_hevc(&metadata.header) {
            0 => 8,
            profile => profile,
        };
    }

    let mut verify = DoviContext::new("verify");
    verify.cfg = enc.cfg;

    if enc.cfg.dv_profile == 10 {
        let t35 = enc.generate(Some(metadata), GenerateFlags::WRAP_T35)?;
        verify.parse(unwrap_t35(&t35)?, ErrorRecognition::CRCCHECK | ErrorRecognition::EXPLODE)?;
    }
    else {
        let nal = enc.generate(Some(metadata), GenerateFlags::WRAP_NAL)?;
        verify.parse(&unwrap_nal(&nal), ErrorRecognition::CRCCHECK | ErrorRecognition::EXPLODE)?;
    }

    Ok(verify.get_metadata().as_ref() == Some(metadata))
}

fn read_rpu(path: &Path, args: &Args) -> Result<Vec<u8>> {
    let data = std::fs::read(path)?;

    if args.t35 {
        Ok(unwrap_t35(&data)?.to_vec())
    }
    else if args.nal {
        Ok(unwrap_nal(&data))
    }
    else {
        Ok(data)
    }
}

fn run(args: &Args) -> Result<bool> {
    let er = args.err_recognition();

    let mut ctx = DoviContext::new("rpu-info");

    ctx.cfg.dv_profile = match args.profile {
        Some(profile) => profile,
        None if args.t35 => 10,
        None => 0,
    };
    ctx.cfg.dv_md_compression = args.compression.into();

    let mut is_ok = true;

    for path in args.files.iter() {
        println!("{}:", path.display());

        let rpu = read_rpu(path, args)?;

        if let Err(err) = ctx.parse(&rpu, er) {
            warn!("{}: {}", path.display(), err);
            println!("  Error: {}", err);
            is_ok = false;
            continue;
        }

        let metadata = match ctx.get_metadata() {
            Some(metadata) => metadata,
            None => {
                println!("  No metadata");
                continue;
            }
        };

        print_metadata(&metadata);

        if args.roundtrip {
            match roundtrip(&ctx, &metadata) {
                Ok(true) => info!("{}: roundtrip ok", path.display()),
                Ok(false) => {
                    println!("  Roundtrip: MISMATCH");
                    is_ok = false;
                }
                Err(err) => {
                    println!("  Roundtrip: {}", err);
                    is_ok = false;
                }
            }
        }

        println!();
    }

    Ok(is_ok)
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    pretty_env_logger::formatted_builder().filter_level(level).parse_default_env().init();

    let code = match run(&args) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            eprintln!("Error: {}", err);
            2
        }
    };

    process::exit(code)
}
