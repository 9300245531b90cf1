use chip8vm::prelude::*;

const MAZE: &[u8] = include_bytes!("../programs/maze");

/// Address of the `JP self` the program ends on.
const MAZE_END: u16 = 0x218;

fn run_maze(seed: u64) -> Chip8Vm {
    let mut vm = Chip8Vm::new(Chip8Conf {
        rng_seed: Some(seed),
        ..Default::default()
    });
    vm.load_bytecode(MAZE).unwrap();

    for _ in 0..1000 {
        vm.run_frame().unwrap();
        if vm.machine().pc() == MAZE_END {
            break;
        }
    }
    vm
}

#[test]
fn test_maze_completes() {
    let vm = run_maze(0xC8);
    assert_eq!(vm.machine().pc(), MAZE_END);

    // 16x8 cells of 4 lit pixels, none overlapping
    assert_eq!(vm.machine().display().lit_count(), 512);
    assert_eq!(vm.machine().register(0xF), 0);

    let published = vm.display().snapshot();
    assert_eq!(&published, vm.machine().display());
}

#[test]
fn test_maze_deterministic() {
    let a = run_maze(42);
    let b = run_maze(42);
    assert_eq!(a.machine().display(), b.machine().display());
}

#[test]
fn test_maze_dump() {
    let vm = run_maze(7);
    let dump = vm.dump_display().unwrap();
    assert_eq!(dump.lines().count(), 32);
    assert_eq!(dump.chars().filter(|c| *c == '#').count(), 512);

    let ram = vm.dump_ram(MAZE.len()).unwrap();
    assert!(ram.starts_with("0200: A21E\n"));
}
