#![no_main]
use libfuzzer_sys::fuzz_target;
use oxidepth::codec::{TrvlDecoder, rvl};

fuzz_target!(|data: &[u8]| {
    // First two bytes pick the frame size, the rest is the block.
    // Decoders must never panic, only return errors.
    if data.len() < 2 {
        return;
    }
    let frame_size = usize::from(u16::from_le_bytes([data[0], data[1]])).max(1);
    let block = &data[2..];

    let _ = rvl::decode(block, frame_size);

    if let Ok(mut dec) = TrvlDecoder::new(frame_size) {
        let before = dec.reference().to_vec();
        if dec.decode(block).is_err() {
            assert_eq!(dec.reference(), before.as_slice());
        }
        let _ = dec.decode_keyframe(block);
    }
});
