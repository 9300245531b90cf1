//! Keypad and display accessed from threads other than the interpreter's.
use std::{sync::mpsc, thread};

use chip8vm::prelude::*;

#[test]
fn test_key_from_input_thread() {
    let mut vm = Chip8Vm::new(Chip8Conf::default());
    vm.load_bytecode(&[0xF4, 0x0A, 0x12, 0x02]).unwrap();
    assert_eq!(vm.step().unwrap(), Flow::KeyWait);

    let keypad = vm.keypad();
    let (tx, rx) = mpsc::channel();
    let input = thread::spawn(move || {
        // wait until the VM is known to be stalled
        rx.recv().unwrap();
        keypad.set_key(KeyCode::KeyE, true);
        keypad.set_key(KeyCode::KeyE, false);
    });

    assert_eq!(vm.step().unwrap(), Flow::KeyWait);
    tx.send(()).unwrap();
    input.join().unwrap();

    assert_eq!(vm.step().unwrap(), Flow::Ok);
    assert_eq!(vm.state(), ExecState::Running);
    assert_eq!(vm.machine().register(4), 0xE);
}

#[test]
fn test_display_from_render_thread() {
    let mut vm = Chip8Vm::new(Chip8Conf::default());
    // LD I, font 0; DRW v0, v0, 5; JP self
    vm.load_bytecode(&[0xA1, 0x00, 0xD0, 0x05, 0x12, 0x04]).unwrap();

    let display = vm.display();
    let before = display.generation();

    vm.run_steps(2).unwrap();

    let renderer = thread::spawn(move || {
        let mut lit = 0;
        display.for_each_pixel(|_, _, on| lit += on as usize);
        (display.generation(), lit, display.snapshot())
    });
    let (generation, lit, frame) = renderer.join().unwrap();

    assert!(generation > before);
    assert_eq!(lit, 14);
    assert_eq!(&frame, vm.machine().display());
}

#[test]
fn test_concurrent_stepping() {
    let mut vm = Chip8Vm::new(Chip8Conf::default());
    // press any key to redraw
    vm.load_bytecode(&[
        0x00, 0xE0, // CLS
        0xA1, 0x00, // LD I, font 0
        0xF1, 0x0A, // LD v1, K
        0xD0, 0x05, // DRW v0, v0, 5
        0x12, 0x04, // JP 0x204
    ])
    .unwrap();

    let keypad = vm.keypad();
    let display = vm.display();

    let input = thread::spawn(move || {
        for key in KeyCode::ALL {
            keypad.set_key(key, true);
            thread::yield_now();
            keypad.set_key(key, false);
        }
    });

    let renderer = thread::spawn(move || {
        // only whole sprites are ever visible
        for _ in 0..100 {
            let lit = display.snapshot().lit_count();
            assert!(lit == 0 || lit == 14, "partial frame with {lit} pixels");
            thread::yield_now();
        }
    });

    for _ in 0..1000 {
        vm.step().unwrap();
    }

    input.join().unwrap();
    renderer.join().unwrap();
}
