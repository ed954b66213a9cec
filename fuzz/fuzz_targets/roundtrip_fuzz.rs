#![no_main]
use libfuzzer_sys::fuzz_target;
use oxidepth::codec::{TrvlConfig, TrvlDecoder, TrvlEncoder, rvl};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let frame_size = usize::from(data[0]).max(1);
    let change_threshold = u32::from(data[1]);
    let invalidation_threshold = u32::from(data[2]).max(1);
    let pixels: Vec<i16> = data[3..]
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();

    for frame in pixels.chunks_exact(frame_size) {
        let block = rvl::encode(frame);
        assert_eq!(rvl::decode(&block, frame_size).unwrap(), frame);
    }

    let config = TrvlConfig {
        change_threshold,
        invalidation_threshold,
    };
    let mut enc = TrvlEncoder::new(frame_size, config).unwrap();
    let mut dec = TrvlDecoder::new(frame_size).unwrap();
    for frame in pixels.chunks_exact(frame_size) {
        let block = enc.encode(frame).unwrap();
        let decoded = dec.decode(&block).unwrap();
        assert_eq!(decoded.as_slice(), enc.reference());
    }
});
