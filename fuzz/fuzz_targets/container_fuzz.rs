#![no_main]
use libfuzzer_sys::fuzz_target;
use oxidepth::container;

fuzz_target!(|data: &[u8]| {
    // Arbitrary container bytes must load or fail cleanly.
    if let Ok(stack) = container::load(data, None) {
        assert_eq!(stack.data().len(), stack.frame_count() * stack.frame_size());
    }
});
