// src/script.rs
use crate::block_device::BLOCK_SIZE;
use crate::error::FsError;
use crate::flat_fs::{FlatFs, MAX_FILE_BLOCKS};
use crate::inode::NAME_LEN;
use log::debug;
use std::io::{self, BufRead, Write};

const MAX_BLOCK_INDEX: usize = 126;

/// One parsed line of a command script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Mount(String),
    Create(String, usize),
    Delete(String),
    Read(String, usize),
    Write(String, usize),
    Buffer(Vec<u8>),
    List,
    Resize(String, usize),
    Defragment,
    ChangeDir(String),
}

fn name_arg(token: &str) -> Option<String> {
    (token.len() <= NAME_LEN).then(|| token.to_string())
}

fn number_arg(token: &str, min: usize, max: usize) -> Option<usize> {
    token.parse::<usize>().ok().filter(|n| (min..=max).contains(n))
}

/// Parses a non-empty line. `None` means the line is malformed.
///
/// A `B` payload is taken as raw bytes; every other command must be UTF-8.
pub fn parse(line: &[u8]) -> Option<Command> {
    if line == b"B" {
        return Some(Command::Buffer(Vec::new()));
    }
    if let Some(content) = line.strip_prefix(b"B ") {
        return (content.len() <= BLOCK_SIZE).then(|| Command::Buffer(content.to_vec()));
    }

    let line = std::str::from_utf8(line).ok()?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let command = match tokens.as_slice() {
        ["M", disk] => Command::Mount(disk.to_string()),
        ["C", name, size] => Command::Create(name_arg(name)?, number_arg(size, 0, MAX_FILE_BLOCKS)?),
        ["D", name] => Command::Delete(name_arg(name)?),
        ["R", name, block] => Command::Read(name_arg(name)?, number_arg(block, 0, MAX_BLOCK_INDEX)?),
        ["W", name, block] => Command::Write(name_arg(name)?, number_arg(block, 0, MAX_BLOCK_INDEX)?),
        ["E", name, size] => Command::Resize(name_arg(name)?, number_arg(size, 1, MAX_FILE_BLOCKS)?),
        ["Y", name] => Command::ChangeDir(name_arg(name)?),
        ["L"] if line == "L" => Command::List,
        ["O"] if line == "O" => Command::Defragment,
        _ => return None,
    };
    Some(command)
}

/// Runs one command against `fs`, writing listings to `out`.
pub fn execute<O: Write>(fs: &mut FlatFs, command: &Command, out: &mut O) -> Result<(), FsError> {
    match command {
        Command::Mount(disk) => fs.mount(disk),
        Command::Create(name, size) => fs.create(name, *size),
        Command::Delete(name) => fs.delete(name),
        Command::Read(name, block) => fs.read(name, *block),
        Command::Write(name, block) => fs.write(name, *block),
        Command::Buffer(bytes) => fs.set_buffer(bytes),
        Command::List => {
            for entry in fs.list()? {
                writeln!(out, "{}", entry)?;
            }
            Ok(())
        }
        Command::Resize(name, size) => fs.resize(name, *size),
        Command::Defragment => fs.defragment().map(|_| ()),
        Command::ChangeDir(name) => fs.change_directory(name),
    }
}

/// Executes every line of `input`. Malformed lines and failed operations are
/// reported on `err` and never stop the script.
pub fn run<R, O, E>(
    input: R,
    script_name: &str,
    fs: &mut FlatFs,
    out: &mut O,
    err: &mut E,
) -> io::Result<()>
where
    R: BufRead,
    O: Write,
    E: Write,
{
    for (i, line) in input.split(b'\n').enumerate() {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        let line_no = i + 1;
        if line.is_empty() {
            continue;
        }

        let command = match parse(&line) {
            Some(command) => command,
            None => {
                writeln!(err, "Command Error: {}, {}", script_name, line_no)?;
                continue;
            }
        };
        debug!("{}:{}: {:?}", script_name, line_no, command);

        if let Err(e) = execute(fs, &command, out) {
            writeln!(err, "Error: {}", e)?;
        }
    }
    out.flush()?;
    err.flush()
}
