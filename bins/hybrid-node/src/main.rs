//! Entry point wiring the gas-metered interpreter and the devp2p
//! transport behind a small CLI.

mod command;
mod pretty_print;

use clap::Parser;
use command::{Cli, Commands};
use evm_interpreter::host::{Host, StorageStatus, TxContext};
use evm_interpreter::{CallFlags, CallFrame, CallKind};
use evm_primitives::{Address, Hash, Revision, Word};
use net_core::NodeId;
use net_host::Host as NetHost;
use secp256k1::Secp256k1;
use std::collections::HashMap;
use std::net::SocketAddr;

/// An in-memory `Host` used for the `demo` command; it has no persistence
/// and no sub-call support, enough to run a few opcodes to completion.
struct DemoHost {
    storage: HashMap<(Address, Word), Word>,
    balances: HashMap<Address, Word>,
}

impl DemoHost {
    fn new() -> Self {
        DemoHost {
            storage: HashMap::new(),
            balances: HashMap::new(),
        }
    }
}

impl Host for DemoHost {
    fn account_exists(&mut self, _addr: Address) -> bool {
        true
    }

    fn get_storage(&mut self, addr: Address, key: Word) -> Word {
        self.storage.get(&(addr, key)).copied().unwrap_or(Word::ZERO)
    }

    fn set_storage(&mut self, addr: Address, key: Word, value: Word) -> StorageStatus {
        let previous = self.get_storage(addr, key);
        self.storage.insert((addr, key), value);
        if previous == value {
            StorageStatus::Unchanged
        } else if previous == Word::ZERO {
            StorageStatus::Added
        } else if value == Word::ZERO {
            StorageStatus::Deleted
        } else {
            StorageStatus::Modified
        }
    }

    fn get_balance(&mut self, addr: Address) -> Word {
        self.balances.get(&addr).copied().unwrap_or(Word::ZERO)
    }

    fn get_code_size(&mut self, _addr: Address) -> u64 {
        0
    }

    fn get_code_hash(&mut self, _addr: Address) -> Hash {
        Hash::ZERO
    }

    fn copy_code(&mut self, _addr: Address, _offset: u64, _buf: &mut [u8]) -> u64 {
        0
    }

    fn selfdestruct(&mut self, _self_addr: Address, _beneficiary: Address) -> bool {
        false
    }

    fn emit_log(&mut self, _addr: Address, _data: Vec<u8>, _topics: Vec<Word>) {}

    fn get_tx_context(&mut self) -> TxContext {
        TxContext {
            origin: Address::ZERO,
            gas_price: Word::from(1u64),
            coinbase: Address::ZERO,
            number: 1,
            timestamp: 0,
            gas_limit: 30_000_000,
            difficulty: Word::ZERO,
            chain_id: 1,
        }
    }

    fn get_block_hash(&mut self, _number: u64) -> Hash {
        Hash::ZERO
    }

    fn call(&mut self, _frame: CallFrame) -> evm_interpreter::CallResult {
        evm_interpreter::CallResult::failure(evm_primitives::StatusCode::InternalError)
    }
}

/// `PUSH1 1 PUSH1 1 ADD PUSH1 0x00 MSTORE PUSH1 0x20 PUSH1 0x00 RETURN`:
/// the literal "simple add" scenario, returning a 32-byte big-endian `2`.
fn demo_bytecode() -> Vec<u8> {
    vec![
        0x60, 0x01, // PUSH1 1
        0x60, 0x01, // PUSH1 1
        0x01, // ADD
        0x60, 0x00, // PUSH1 0
        0x52, // MSTORE
        0x60, 0x20, // PUSH1 32
        0x60, 0x00, // PUSH1 0
        0xf3, // RETURN
    ]
}

fn run_demo() {
    let code = evm_interpreter::Code::new(&demo_bytecode(), true);
    let frame = CallFrame {
        kind: CallKind::Call,
        flags: CallFlags::NONE,
        depth: 0,
        gas: 100_000,
        recipient: Address::ZERO,
        sender: Address::ZERO,
        value: Word::ZERO,
        input: Vec::new(),
        code_hash: Hash::ZERO,
        salt: None,
    };
    let mut host = DemoHost::new();
    let result = evm_interpreter::execute(&mut host, Revision::LATEST, frame, &code);
    println!(
        "status={:?} gas_left={} output={}",
        result.status,
        result.gas_left,
        hex_encode(&result.output)
    );
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Config => {
            pretty_print::print_config(cli.dev, "Berlin", cli.tcp_port, cli.udp_port);
        }
        Commands::Demo => {
            pretty_print::print_startup_banner(cli.dev);
            run_demo();
        }
        Commands::Start => {
            pretty_print::print_startup_banner(cli.dev);

            let secp = Secp256k1::new();
            let (_secret, public) = secp.generate_keypair(&mut rand::thread_rng());
            let local_id = NodeId::from_public_key(&public);

            let tcp_addr: SocketAddr = ([0, 0, 0, 0], cli.tcp_port).into();
            let udp_addr: SocketAddr = ([0, 0, 0, 0], cli.udp_port).into();

            let mut host = NetHost::new(local_id);
            host.start(tcp_addr, udp_addr).await?;

            let mut ticker = net_host::host::tick_loop_interval();
            tracing::info!("node running, press ctrl-c to stop");
            loop {
                tokio::select! {
                    _ = ticker.tick() => host.tick(),
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            host.stop();
        }
    }

    Ok(())
}
