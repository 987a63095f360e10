//! End-to-end execution of small synthetic stories through `HeadlessHost`

mod common;

use common::{small_world, StoryBuilder};
use gruesome::config::InterpreterConfig;
use gruesome::error::ZError;
use gruesome::host_headless::HeadlessHost;
use gruesome::interpreter::{Interpreter, RunState};
use test_log::test;

#[test]
fn add_stores_without_printing() {
    // add #2 #3 -> g0 ; quit
    let mut interp = small_world().code(&[0x14, 0x02, 0x03, 0x10, 0xBA]).interpreter();
    assert_eq!(interp.run(), Ok(RunState::Quit));
    assert_eq!(interp.vm.read_global(0x10), Ok(5));
    assert_eq!(interp.host.print_calls(), 0);
}

#[test]
fn add_inside_called_routine_returns_sum() {
    // Routine with no locals: add #2 #3 -> sp ; ret_popped
    let routine = [0x00, 0x14, 0x02, 0x03, 0x00, 0xB8];
    // call 0x1200 -> g0 ; quit
    let code = [0xE0, 0x3F, 0x09, 0x00, 0x10, 0xBA];
    let mut interp = small_world().code(&code).routine(0x1200, &routine).interpreter();
    assert_eq!(interp.run(), Ok(RunState::Quit));
    assert_eq!(interp.vm.read_global(0x10), Ok(5));
    assert_eq!(interp.host.print_calls(), 0);
    assert!(interp.vm.is_main_routine());
    assert!(interp.vm.stack().is_empty());
}

#[test]
fn hello_world_prints_once() {
    let mut code = vec![0xB2];
    code.extend(gruesome::text::encode_string("Hello, world"));
    code.extend([0xBB, 0xBA]);
    let mut interp = StoryBuilder::new().code(&code).interpreter();
    assert_eq!(interp.run(), Ok(RunState::Quit));
    assert_eq!(interp.host.output(), "Hello, world\n");
}

#[test]
fn routine_frames_are_isolated() {
    // Main pushes 11, calls a routine that clobbers its own local and
    // pushes junk, then prints the value it got back.
    let routine = [
        0x01, 0x00, 0x05, // 1 local, default 5
        0xE8, 0x7F, 0x63, // push #99
        0x0D, 0x01, 0x2A, // store L1 #42
        0xAB, 0x01, // ret L1
    ];
    let code = [
        0xE8, 0x7F, 0x0B, // push #11
        0xE0, 0x3F, 0x09, 0x00, 0x10, // call 0x1200 -> g0
        0xE6, 0xBF, 0x00, // print_num sp
        0xBA, // quit
    ];
    let mut interp = small_world().code(&code).routine(0x1200, &routine).interpreter();
    assert_eq!(interp.run(), Ok(RunState::Quit));
    assert_eq!(interp.vm.read_global(0x10), Ok(42));
    assert_eq!(interp.host.output(), "11");
    assert!(interp.vm.stack().is_empty());
}

#[test]
fn host_can_call_routines_directly() {
    // 2 locals: returns L1 - L2
    let routine = [0x02, 0x00, 0x00, 0x00, 0x00, 0x75, 0x01, 0x02, 0x00, 0xB8];
    let mut interp = small_world().code(&[0xBA]).routine(0x1200, &routine).interpreter();
    assert_eq!(interp.call_routine(0x0900, &[10, 3]), Ok(7));
    assert_eq!(interp.call_routine(0x0900, &[3, 10]), Ok((-7i16) as u16));
    assert_eq!(interp.vm.pc, 0x1000);
}

#[test]
fn unknown_opcode_stops_the_machine() {
    // 2OP:0x00 does not exist
    let mut interp = small_world().code(&[0x00, 0x01, 0x02]).interpreter();
    assert_eq!(
        interp.run(),
        Err(ZError::UnknownOpcode {
            opcode: 0x00,
            form: "2OP",
            pc: 0x1000
        })
    );
}

#[test]
fn random_stays_in_range() {
    // random #6 -> g0 ; jump back
    let code = [0xE7, 0x7F, 0x06, 0x10, 0x8C, 0xFF, 0xFB];
    let mut interp = small_world().code(&code).interpreter();
    for _ in 0..200 {
        interp.step().unwrap();
        let value = interp.vm.read_global(0x10).unwrap();
        assert!((1..=6).contains(&value), "random gave {}", value);
        interp.step().unwrap();
    }
}

#[test]
fn seeded_random_is_repeatable() {
    let code = [0xE7, 0x7F, 0x64, 0x10, 0x8C, 0xFF, 0xFB];
    let config = InterpreterConfig {
        seed: Some(1234),
        ..Default::default()
    };
    let sample = || {
        let story = small_world().code(&code);
        let mut interp = Interpreter::with_config(story.game(), HeadlessHost::new(), &config).unwrap();
        (0..20)
            .map(|_| {
                interp.step().unwrap();
                interp.step().unwrap();
                interp.vm.read_global(0x10).unwrap()
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(sample(), sample());
}

#[test]
fn negative_random_reseeds() {
    // random #-7 -> g0 ; random #0 -> g1
    let code = [0xE7, 0x3F, 0xFF, 0xF9, 0x10, 0xE7, 0x7F, 0x00, 0x11, 0xBA];
    let mut interp = small_world().code(&code).interpreter();
    assert_eq!(interp.run(), Ok(RunState::Quit));
    assert_eq!(interp.vm.read_global(0x10), Ok(0));
    assert_eq!(interp.vm.read_global(0x11), Ok(0));
}

#[test]
fn status_line_uses_location_and_score() {
    let interp_code = [0xBC, 0xBA]; // show_status ; quit
    let mut interp = small_world()
        .code(&interp_code)
        .global(0x10, 1)
        .global(0x11, 10)
        .global(0x12, 3)
        .interpreter();
    interp.run().unwrap();
    let (location, status) = interp.host.status.clone().unwrap();
    assert_eq!(location, "room");
    assert_eq!(status.describe(), "Score: 10  Moves: 3");
}

#[test]
fn verify_passes_on_untouched_story() {
    // verify ?+4 (skip two quits) ; print_num #1 ; quit
    let code = [0xBD, 0xC4, 0xBA, 0xBA, 0xE6, 0x7F, 0x01, 0xBA];
    let mut interp = small_world().code(&code).interpreter();
    assert_eq!(interp.run(), Ok(RunState::Quit));
    assert_eq!(interp.host.output(), "1");
}
