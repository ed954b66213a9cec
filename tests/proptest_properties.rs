use oxidepth::codec::vle::{zigzag_decode, zigzag_encode};
use oxidepth::codec::{Encoder, TrvlConfig, TrvlDecoder, TrvlEncoder, rvl};
use oxidepth::container::{self, FrameStack};
use proptest::prelude::*;

/// Depth-like pixels: mostly valid readings, some holes.
fn pixel() -> impl Strategy<Value = i16> {
    prop_oneof![
        1 => Just(0i16),
        3 => 300i16..6000,
        1 => any::<i16>(),
    ]
}

fn frame(len: usize) -> impl Strategy<Value = Vec<i16>> {
    proptest::collection::vec(pixel(), len)
}

proptest! {
    #[test]
    fn prop_zigzag_inverts(v in any::<i32>()) {
        prop_assert_eq!(zigzag_decode(zigzag_encode(v)), v);
    }

    #[test]
    fn prop_rvl_roundtrip(frame in proptest::collection::vec(pixel(), 1..2048)) {
        let block = rvl::encode(&frame);
        prop_assert_eq!(rvl::decode(&block, frame.len()).unwrap(), frame);
    }

    #[test]
    fn prop_rvl_rejects_any_truncation(
        frame in proptest::collection::vec(300i16..6000, 1..256),
        cut in 1usize..8
    ) {
        // Every pixel non-zero, so every byte carries data.
        let block = rvl::encode(&frame);
        let keep = block.len().saturating_sub(cut);
        prop_assert!(rvl::decode(&block[..keep], frame.len()).is_err());
    }

    #[test]
    fn prop_trvl_lossless_sequence(
        frames in (1usize..512).prop_flat_map(|n| proptest::collection::vec(frame(n), 1..6))
    ) {
        let n = frames[0].len();
        let mut enc = TrvlEncoder::new(n, TrvlConfig::lossless()).unwrap();
        let mut dec = TrvlDecoder::new(n).unwrap();
        for f in &frames {
            let block = enc.encode(f).unwrap();
            prop_assert_eq!(&dec.decode(&block).unwrap(), f);
        }
    }

    #[test]
    fn prop_trvl_decoder_tracks_encoder(
        frames in (1usize..256).prop_flat_map(|n| proptest::collection::vec(frame(n), 1..8)),
        change_threshold in 0u32..64,
        invalidation_threshold in 1u32..5
    ) {
        let n = frames[0].len();
        let config = TrvlConfig { change_threshold, invalidation_threshold };
        let mut enc = TrvlEncoder::new(n, config).unwrap();
        let mut dec = TrvlDecoder::new(n).unwrap();
        for f in &frames {
            let block = enc.encode(f).unwrap();
            let decoded = dec.decode(&block).unwrap();
            prop_assert_eq!(decoded.as_slice(), enc.reference());
            for (d, p) in decoded.iter().zip(f) {
                let err = (i32::from(*d) - i32::from(*p)).unsigned_abs();
                prop_assert!(*d == 0 || err <= change_threshold);
            }
        }
    }

    #[test]
    fn prop_idle_pixel_invalidated_after_threshold(
        value in 100i16..5000,
        k in 1u32..6
    ) {
        let config = TrvlConfig { change_threshold: 10, invalidation_threshold: k };
        let mut enc = TrvlEncoder::new(1, config).unwrap();
        let mut dec = TrvlDecoder::new(1).unwrap();
        prop_assert_eq!(dec.decode(&enc.encode(&[value]).unwrap()).unwrap(), vec![value]);
        for _ in 1..k {
            prop_assert_eq!(dec.decode(&enc.encode(&[value]).unwrap()).unwrap(), vec![value]);
        }
        prop_assert_eq!(dec.decode(&enc.encode(&[value]).unwrap()).unwrap(), vec![0]);
    }

    #[test]
    fn prop_container_roundtrip(
        (h, w, frames) in (1usize..8, 1usize..8).prop_flat_map(|(h, w)| {
            (Just(h), Just(w), proptest::collection::vec(frame(h * w), 0..5))
        }),
        use_trvl in any::<bool>()
    ) {
        let stack = FrameStack::from_frames(&[h, w], &frames).unwrap();
        let mut enc = if use_trvl {
            Encoder::trvl(h * w, TrvlConfig::lossless()).unwrap()
        } else {
            Encoder::rvl(h * w).unwrap()
        };
        let bytes = container::save(&stack, &mut enc).unwrap();
        prop_assert_eq!(container::load(&bytes, None).unwrap(), stack);
    }

    #[test]
    fn prop_decode_garbage_never_panics(
        block in proptest::collection::vec(any::<u8>(), 0..256),
        frame_size in 1usize..512
    ) {
        let _ = rvl::decode(&block, frame_size);
        let mut dec = TrvlDecoder::new(frame_size).unwrap();
        let before = dec.reference().to_vec();
        if dec.decode(&block).is_err() {
            prop_assert_eq!(dec.reference(), before.as_slice());
        }
    }
}
