use crate::audio::{ChannelPolicy, SampleFormat, SampleSpec};
use crate::config::{ConversionConfig, ResamplerQuality};
use crate::error::ConversionError;

use super::*;

fn i16_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn i32_bytes(samples: &[u32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn stereo(format: SampleFormat, rate: u32, policies: [ChannelPolicy; 2]) -> SampleSpec {
    SampleSpec::with_policies(2, format, rate, policies.to_vec())
}

/// Run one conversion into scratch memory and return the bytes
fn run(converter: &mut dyn Converter, src: &SampleSpec, dst: &SampleSpec, input: &[u8]) -> Vec<u8> {
    converter.configure(src, dst).unwrap();
    let frames = src.convert_bytes_to_frames(input.len());
    match converter.convert(input, frames, None).unwrap() {
        ConvertedBuffer::Scratch { data, frames: out } => {
            assert_eq!(data.len(), dst.convert_frames_to_bytes(out));
            data.to_vec()
        }
        other => panic!("expected scratch output, got {other:?}"),
    }
}

// ===== Remapper =====

#[test]
fn test_stereo_to_mono_i16() {
    let src = SampleSpec::new(2, SampleFormat::I16, 44100);
    let dst = SampleSpec::new(1, SampleFormat::I16, 44100);
    let input = i16_bytes(&[
        10, 10, 0xFF00, 0x00FF, 2, 9, 0x7F00, 0x00FF, 0xFFFF, 0xFFFF, 0, 0,
    ]);

    let out = run(&mut Remapper::new(), &src, &dst, &input);
    assert_eq!(out, i16_bytes(&[10, 0xFFFF, 5, 0x3FFF, 0xFFFF, 0]));
}

#[test]
fn test_stereo_to_mono_i24_uses_signed_floor() {
    let src = SampleSpec::new(2, SampleFormat::I24In32, 44100);
    let dst = SampleSpec::new(1, SampleFormat::I24In32, 44100);
    let input = i32_bytes(&[
        0xDEAD_BEEF, 0xDEAD_BEEF,
        0xBEEF_DEAD, 0xDEAD_BEEF,
        0x1234_5678, 0x5678_1234,
        0x0000_FFFF, 0xFFFF_0000,
        0xFFFF_FFFF, 0xFFFF_FFFF,
        0, 0,
    ]);

    let out = run(&mut Remapper::new(), &src, &dst, &input);
    assert_eq!(
        out,
        i32_bytes(&[
            0xDEAD_BEEF,
            0xCECE_CECE,
            0x3456_3456,
            0xFFFF_FFFF, // 65535 + -65536 = -1, floor(-0.5) = -1
            0xFFFF_FFFF,
            0,
        ])
    );
}

#[test]
fn test_mono_to_stereo_duplicates() {
    let src = SampleSpec::new(1, SampleFormat::I16, 44100);
    let dst = SampleSpec::new(2, SampleFormat::I16, 44100);
    let input = i16_bytes(&[0xDEAD, 0xBEEF, 0x1234, 0xFFFF, 0]);

    let out = run(&mut Remapper::new(), &src, &dst, &input);
    assert_eq!(
        out,
        i16_bytes(&[0xDEAD, 0xDEAD, 0xBEEF, 0xBEEF, 0x1234, 0x1234, 0xFFFF, 0xFFFF, 0, 0])
    );

    let src = SampleSpec::new(1, SampleFormat::I24In32, 44100);
    let dst = SampleSpec::new(2, SampleFormat::I24In32, 44100);
    let out = run(
        &mut Remapper::new(),
        &src,
        &dst,
        &i32_bytes(&[0xDEAD_BEEF, 0x1234_5678]),
    );
    assert_eq!(
        out,
        i32_bytes(&[0xDEAD_BEEF, 0xDEAD_BEEF, 0x1234_5678, 0x1234_5678])
    );
}

#[test]
fn test_mono_to_stereo_ignored_channel() {
    use ChannelPolicy::{Copy, Ignore};

    let src = SampleSpec::new(1, SampleFormat::I16, 48000);
    let dst = stereo(SampleFormat::I16, 48000, [Copy, Ignore]);
    let input = i16_bytes(&[7, 9]);
    let mut output = i16_bytes(&[0x5555; 4]);

    let mut remapper = Remapper::new();
    remapper.configure(&src, &dst).unwrap();
    remapper.process(&input, 2, Some(&mut output[..])).unwrap();
    assert_eq!(output, i16_bytes(&[7, 0x5555, 9, 0x5555]));

    let config = ConversionConfig::builder()
        .silence_ignored_channels(true)
        .build();
    let mut remapper = Remapper::with_config(&config);
    remapper.configure(&src, &dst).unwrap();
    remapper.process(&input, 2, Some(&mut output[..])).unwrap();
    assert_eq!(output, i16_bytes(&[7, 0, 9, 0]));
}

#[test]
fn test_policy_copy_copy_to_average_ignore() {
    use ChannelPolicy::{Average, Copy, Ignore};

    let src = stereo(SampleFormat::I16, 44100, [Copy, Copy]);
    let dst = stereo(SampleFormat::I16, 44100, [Average, Ignore]);
    let input = i16_bytes(&[10, 20, 5, 1, 3, 8, 12, 15, 0, 0]);

    let out = run(&mut Remapper::new(), &src, &dst, &input);
    assert_eq!(out, i16_bytes(&[15, 0, 3, 0, 5, 0, 13, 0, 0, 0]));
}

#[test]
fn test_policy_copy_ignore_to_copy_copy() {
    use ChannelPolicy::{Copy, Ignore};

    let src = stereo(SampleFormat::I24In32, 44100, [Copy, Ignore]);
    let dst = stereo(SampleFormat::I24In32, 44100, [Copy, Copy]);
    let input = i32_bytes(&[
        0xDEAD_DEAD, 0xBEEF_BEEF,
        0x1234_5678, 0x5678_1234,
        0, 0xFFFF_FFFF,
    ]);

    let out = run(&mut Remapper::new(), &src, &dst, &input);
    assert_eq!(
        out,
        i32_bytes(&[
            0xDEAD_DEAD, 0xDEAD_DEAD,
            0x1234_5678, 0x1234_5678,
            0, 0,
        ])
    );
}

#[test]
fn test_policy_all_ignored_source_averages_to_zero() {
    use ChannelPolicy::{Copy, Ignore};

    let src = stereo(SampleFormat::I16, 48000, [Ignore, Ignore]);
    let dst = stereo(SampleFormat::I16, 48000, [Copy, Copy]);
    let out = run(&mut Remapper::new(), &src, &dst, &i16_bytes(&[100, 200]));
    assert_eq!(out, i16_bytes(&[0, 0]));
}

// ===== Reformatter =====

#[test]
fn test_reformat_16_to_24_sign_extends() {
    let src = SampleSpec::new(2, SampleFormat::I16, 44100);
    let dst = SampleSpec::new(2, SampleFormat::I24In32, 44100);
    let input = i16_bytes(&[0xDEAD, 0x1234, 0x5678, 0xFFFF, 0, 0x7FFF]);

    let out = run(&mut Reformatter::new(), &src, &dst, &input);
    assert_eq!(
        out,
        i32_bytes(&[
            0xFFDE_AD00,
            0x0012_3400,
            0x0056_7800,
            0xFFFF_FF00,
            0,
            0x007F_FF00,
        ])
    );
}

#[test]
fn test_reformat_24_to_16() {
    let src = SampleSpec::new(2, SampleFormat::I24In32, 48000);
    let dst = SampleSpec::new(2, SampleFormat::I16, 48000);
    let input = i32_bytes(&[
        0x00AD_BEEF, 0x00EF_DEAD,
        0xBEEF_DEAD, 0xDEAD_BEEF,
        0x1234_5678, 0x5678_1234,
        0x0000_FFFF, 0xFFFF_0000,
        0xFFFF_FFFF, 0,
    ]);

    let out = run(&mut Reformatter::new(), &src, &dst, &input);
    assert_eq!(
        out,
        i16_bytes(&[
            0xADBE, 0xEFDE, 0xEFDE, 0xADBE, 0x3456, 0x7812, 0x00FF, 0xFF00, 0xFFFF, 0,
        ])
    );
}

#[test]
fn test_reformat_round_trip_is_lossless_from_16() {
    let narrow = SampleSpec::new(1, SampleFormat::I16, 48000);
    let wide = SampleSpec::new(1, SampleFormat::I24In32, 48000);
    let input = i16_bytes(&[0x1234, 0x8000, 0x7FFF, 0xFFFF]);

    let widened = run(&mut Reformatter::new(), &narrow, &wide, &input);
    let back = run(&mut Reformatter::new(), &wide, &narrow, &widened);
    assert_eq!(back, input);
}

// ===== Shared behaviour =====

#[test]
fn test_configure_rejects_equal_or_multi_dimension_pairs() {
    let base = SampleSpec::new(2, SampleFormat::I16, 48000);
    let converters: Vec<Box<dyn Converter>> = vec![
        Box::new(Remapper::new()),
        Box::new(Reformatter::new()),
        Box::new(Resampler::new()),
    ];

    for mut converter in converters {
        let err = converter.configure(&base, &base).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidOperation { .. }));

        let two_dims = SampleSpec::new(1, SampleFormat::I24In32, 44100);
        let err = converter.configure(&base, &two_dims).unwrap_err();
        assert!(err.is_configuration_error());
    }
}

#[test]
fn test_caller_buffer_too_small() {
    let src = SampleSpec::new(1, SampleFormat::I16, 48000);
    let dst = SampleSpec::new(2, SampleFormat::I16, 48000);
    let mut remapper = Remapper::new();
    remapper.configure(&src, &dst).unwrap();

    let mut output = [0u8; 6];
    let err = remapper
        .process(&i16_bytes(&[1, 2]), 2, Some(&mut output[..]))
        .unwrap_err();
    assert!(matches!(err, ConversionError::InvalidOperation { .. }));
}

#[test]
fn test_short_source_is_rejected() {
    let src = SampleSpec::new(2, SampleFormat::I16, 48000);
    let dst = SampleSpec::new(2, SampleFormat::I24In32, 48000);
    let mut reformatter = Reformatter::new();
    reformatter.configure(&src, &dst).unwrap();
    assert!(reformatter.process(&[0u8; 6], 2, None).is_err());
}

#[test]
fn test_reconfigure_replaces_pair() {
    let mut reformatter = Reformatter::new();
    let i16_spec = SampleSpec::new(1, SampleFormat::I16, 48000);
    let i24_spec = SampleSpec::new(1, SampleFormat::I24In32, 48000);

    reformatter.configure(&i16_spec, &i24_spec).unwrap();
    let out = run(&mut reformatter, &i24_spec, &i16_spec, &i32_bytes(&[0x0012_3400]));
    assert_eq!(out, i16_bytes(&[0x1234]));
}

// ===== Resampler =====

#[test]
fn test_resampler_direct_and_pivot_stages() {
    let mut resampler = Resampler::new();
    resampler
        .configure(
            &SampleSpec::new(2, SampleFormat::I16, 44100),
            &SampleSpec::new(2, SampleFormat::I16, 48000),
        )
        .unwrap();
    assert_eq!(resampler.stage_rates(), vec![(44100, 48000)]);

    resampler
        .configure(
            &SampleSpec::new(2, SampleFormat::I16, 11025),
            &SampleSpec::new(2, SampleFormat::I16, 32000),
        )
        .unwrap();
    assert_eq!(resampler.stage_rates(), vec![(11025, 48000), (48000, 32000)]);
}

#[test]
fn test_resampler_rejects_out_of_range_rate() {
    let mut resampler = Resampler::new();
    let err = resampler
        .configure(
            &SampleSpec::new(2, SampleFormat::I16, 48000),
            &SampleSpec::new(2, SampleFormat::I16, 192_000),
        )
        .unwrap_err();
    assert!(matches!(err, ConversionError::InvalidOperation { .. }));
    assert!(resampler.stage_rates().is_empty());
}

#[test]
fn test_resampler_output_count_tracks_ratio() {
    let src = SampleSpec::new(2, SampleFormat::I16, 24000);
    let dst = SampleSpec::new(2, SampleFormat::I16, 48000);
    let mut resampler = Resampler::new();
    resampler.configure(&src, &dst).unwrap();

    let input = vec![0u8; src.convert_frames_to_bytes(240)];
    let mut total = 0;
    for _ in 0..10 {
        let frames = resampler.convert(&input, 240, None).unwrap().frames();
        assert!(frames <= resampler.max_output_frames(240));
        total += frames;
    }
    assert!(total.abs_diff(4800) <= 2, "produced {total}");
}

#[test]
fn test_resampler_saturates_instead_of_wrapping() {
    // Full-scale square wave overshoots under interpolation only at the
    // edges; saturation must keep every sample inside the i16 range.
    let src = SampleSpec::new(1, SampleFormat::I16, 8000);
    let dst = SampleSpec::new(1, SampleFormat::I16, 48000);
    let config = ConversionConfig::builder()
        .resampler_quality(ResamplerQuality::Fft)
        .fft_chunk_frames(64)
        .build();
    let mut resampler = Resampler::with_config(config);
    resampler.configure(&src, &dst).unwrap();

    let square: Vec<u16> = (0..512)
        .map(|i| if (i / 4) % 2 == 0 { 0x7FFF } else { 0x8000 })
        .collect();
    let input = i16_bytes(&square);
    let out = match resampler.convert(&input, 512, None).unwrap() {
        ConvertedBuffer::Scratch { data, .. } => data.to_vec(),
        other => panic!("expected scratch output, got {other:?}"),
    };
    assert!(!out.is_empty());

    let samples: Vec<i16> = out
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect();
    // A wrapped overshoot would flip sign next to a full-scale neighbour
    for pair in samples.windows(2) {
        let jump = (i32::from(pair[0]) - i32::from(pair[1])).abs();
        assert!(jump < 60_000, "wrapped sample pair {pair:?}");
    }
    assert!(samples.iter().any(|&s| s == i16::MAX || s == i16::MIN));
}

#[test]
fn test_resampler_writes_caller_buffer() {
    let src = SampleSpec::new(1, SampleFormat::I24In32, 48000);
    let dst = SampleSpec::new(1, SampleFormat::I24In32, 24000);
    let mut resampler = Resampler::new();
    resampler.configure(&src, &dst).unwrap();

    let input = i32_bytes(&[0x0010_0000; 64]);
    let mut output = vec![0u8; dst.convert_frames_to_bytes(resampler.max_output_frames(64))];
    let result = resampler.convert(&input, 64, Some(&mut output[..])).unwrap();
    let frames = result.frames();
    assert!(matches!(result, ConvertedBuffer::Written { .. }));
    assert!(frames >= 31);

    for chunk in output[..frames * 4].chunks_exact(4).skip(1) {
        let sample = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        assert_eq!(sample, 0x0010_0000);
    }
}

/// Convert each block into scratch memory and concatenate the bytes
fn resample_blocks(resampler: &mut Resampler, src: &SampleSpec, blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for block in blocks {
        let frames = src.convert_bytes_to_frames(block.len());
        let converted = resampler.convert(block, frames, None).unwrap();
        out.extend_from_slice(converted.data().unwrap());
    }
    out
}

#[test]
fn test_resampler_short_output_leaves_stream_untouched() {
    let src = SampleSpec::new(1, SampleFormat::I16, 24000);
    let dst = SampleSpec::new(1, SampleFormat::I16, 48000);
    let blocks = vec![i16_bytes(&[0, 100, 200, 300]), i16_bytes(&[400, 500, 600, 700])];

    let mut reference = Resampler::new();
    reference.configure(&src, &dst).unwrap();
    let expected = resample_blocks(&mut reference, &src, &blocks);
    assert_eq!(&expected[..6], &i16_bytes(&[0, 50, 100])[..]);

    let mut resampler = Resampler::new();
    resampler.configure(&src, &dst).unwrap();
    let mut short = [0u8; 4];
    let err = resampler.convert(&blocks[0], 4, Some(&mut short[..])).unwrap_err();
    assert!(matches!(err, ConversionError::InvalidOperation { .. }));

    assert_eq!(resample_blocks(&mut resampler, &src, &blocks), expected);
}

#[test]
fn test_resampler_short_output_leaves_pivot_stages_untouched() {
    let src = SampleSpec::new(2, SampleFormat::I16, 44100);
    let dst = SampleSpec::new(2, SampleFormat::I16, 88000);
    let blocks: Vec<Vec<u8>> = (0..3u16)
        .map(|block| {
            let samples: Vec<u16> = (0..882u16).map(|i| (i * 37) ^ (block * 1000)).collect();
            i16_bytes(&samples)
        })
        .collect();

    let mut reference = Resampler::new();
    reference.configure(&src, &dst).unwrap();
    assert_eq!(reference.stage_rates().len(), 2);
    let expected = resample_blocks(&mut reference, &src, &blocks);

    let mut resampler = Resampler::new();
    resampler.configure(&src, &dst).unwrap();
    let mut short = vec![0u8; dst.convert_frames_to_bytes(16)];
    let err = resampler.convert(&blocks[0], 441, Some(&mut short[..])).unwrap_err();
    assert!(matches!(err, ConversionError::InvalidOperation { .. }));

    assert_eq!(resample_blocks(&mut resampler, &src, &blocks), expected);
}
