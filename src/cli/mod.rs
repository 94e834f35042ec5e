use crate::tl::tl_id;
use crate::tvm::address::Address;
use crate::tvm::boc::{BocOptions, DecodeOptions, deserialize_boc_ext, serialize_boc_ext};
use crate::tvm::cell::{ArcCell, Cell, CellHash};
use crate::utils::method_name_to_id;
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_with::base64::Base64;
use serde_with::serde_as;
use std::collections::HashMap;
use std::fmt::Write;
use std::str::FromStr;

/// ton-codec CLI
#[derive(Parser, Debug)]
#[command(name = "ton-codec")]
#[command(about = "Inspect TON cells, addresses and TL ids", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bag-of-cells tools
    Boc {
        #[command(subcommand)]
        command: BocCommand,
    },
    /// Print the raw and user-friendly forms of an address
    Address {
        /// Address in raw (`wc:hex`) or user-friendly form
        address: String,
    },
    /// Compute the constructor id of a TL schema line
    TlId {
        schema: String,
    },
    /// Compute the id of a get-method
    MethodId {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum BocCommand {
    /// Decode a BoC and print its cell tree
    Decode {
        /// BoC bytes as hex or base64
        data: String,
        /// Print a JSON report instead of the tree
        #[arg(long)]
        json: bool,
    },
    /// Re-serialize a BoC and print it as base64
    Encode {
        /// BoC bytes as hex or base64
        data: String,
        /// Append a CRC32C checksum
        #[arg(long)]
        crc: bool,
        /// Write the offset index
        #[arg(long)]
        index: bool,
    },
}

#[serde_as]
#[derive(Serialize, Debug)]
struct CellReport {
    index: usize,
    hash: String,
    depth: u16,
    cell_type: String,
    bits: usize,
    #[serde_as(as = "Base64")]
    data: Vec<u8>,
    references: Vec<usize>,
}

/// Every distinct cell once, in discovery order; references are indices
/// into `cells`
#[derive(Serialize, Debug, Default)]
struct BagReport {
    roots: Vec<usize>,
    cells: Vec<CellReport>,
}

impl BagReport {
    fn new(roots: &[ArcCell]) -> Self {
        let mut report = Self::default();
        let mut seen = HashMap::new();
        for root in roots {
            let index = report.visit(root, &mut seen);
            report.roots.push(index);
        }
        report
    }

    fn visit(&mut self, cell: &Cell, seen: &mut HashMap<CellHash, usize>) -> usize {
        let hash = cell.repr_hash();
        if let Some(&index) = seen.get(&hash) {
            return index;
        }
        let index = self.cells.len();
        seen.insert(hash, index);
        self.cells.push(CellReport {
            index,
            hash: hex::encode(hash),
            depth: cell.repr_depth(),
            cell_type: format!("{:?}", cell.cell_type()),
            bits: cell.bit_len(),
            data: cell.data().to_vec(),
            references: Vec::with_capacity(cell.reference_count()),
        });
        for child in cell.references() {
            let child_index = self.visit(child, seen);
            self.cells[index].references.push(child_index);
        }
        index
    }
}

/// Accepts hex first, then standard or URL-safe base64
fn parse_bytes(input: &str) -> Result<Vec<u8>> {
    let input = input.trim();
    if let Ok(bytes) = hex::decode(input) {
        return Ok(bytes);
    }
    STANDARD
        .decode(input)
        .or_else(|_| URL_SAFE.decode(input))
        .context("input is neither hex nor base64")
}

fn decode_roots(data: &str) -> Result<Vec<ArcCell>> {
    let bytes = parse_bytes(data)?;
    let options = DecodeOptions {
        max_roots: usize::MAX,
        ..Default::default()
    };
    let roots = deserialize_boc_ext(&bytes, &options)?;
    log::debug!("decoded {} root(s) from {} bytes", roots.len(), bytes.len());
    Ok(roots)
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Execute the command
    pub fn execute(&self) -> Result<()> {
        let output = self.render()?;
        println!("{output}");
        Ok(())
    }

    /// Runs the command and returns what it prints
    pub fn render(&self) -> Result<String> {
        match &self.command {
            Commands::Boc { command } => match command {
                BocCommand::Decode { data, json } => self.execute_boc_decode(data, *json),
                BocCommand::Encode { data, crc, index } => {
                    self.execute_boc_encode(data, *crc, *index)
                }
            },
            Commands::Address { address } => self.execute_address(address),
            Commands::TlId { schema } => Ok(format!("0x{:08x}", tl_id(schema))),
            Commands::MethodId { name } => Ok(method_name_to_id(name).to_string()),
        }
    }

    fn execute_boc_decode(&self, data: &str, json: bool) -> Result<String> {
        let roots = decode_roots(data)?;
        if json {
            return Ok(serde_json::to_string_pretty(&BagReport::new(&roots))?);
        }

        let mut output = String::new();
        for (i, root) in roots.iter().enumerate() {
            writeln!(output, "root {i}: {}", hex::encode(root.repr_hash()))?;
            output.push_str(&root.display_tree());
        }
        Ok(output.trim_end().to_string())
    }

    fn execute_boc_encode(&self, data: &str, crc: bool, index: bool) -> Result<String> {
        let roots = decode_roots(data)?;
        let options = BocOptions {
            has_index: index,
            has_crc32c: crc,
            has_cache_bits: false,
        };
        let bytes = serialize_boc_ext(&roots, &options)?;
        Ok(STANDARD.encode(bytes))
    }

    fn execute_address(&self, address: &str) -> Result<String> {
        let address = Address::from_str(address)?;
        let mut output = String::new();
        writeln!(output, "raw:                  {}", address.to_raw())?;
        writeln!(
            output,
            "bounceable:           {}",
            address.to_friendly(true, true, false)
        )?;
        writeln!(
            output,
            "non-bounceable:       {}",
            address.to_friendly(true, false, false)
        )?;
        write!(
            output,
            "testnet bounceable:   {}",
            address.to_friendly(true, true, true)
        )?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tvm::builder::CellBuilder;

    fn render(args: &[&str]) -> String {
        let mut argv = vec!["ton-codec"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().render().unwrap()
    }

    #[test]
    fn test_method_id() {
        assert_eq!(render(&["method-id", "seqno"]), "85143");
    }

    #[test]
    fn test_tl_id() {
        assert_eq!(
            render(&["tl-id", "liteServer.getMasterchainInfo = liteServer.MasterchainInfo"]),
            "0x89b5e62e"
        );
    }

    #[test]
    fn test_address_forms() {
        let output = render(&[
            "address",
            "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8",
        ]);
        assert!(output.contains("EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N"));
    }

    #[test]
    fn test_boc_encode_and_decode() {
        // empty cell without checksum
        let hex = "b5ee9c72010101010002000000";
        let with_crc = render(&["boc", "encode", hex, "--crc"]);
        assert_eq!(with_crc, "te6cckEBAQEAAgAAAEysuc0=");

        let tree = render(&["boc", "decode", &with_crc]);
        assert!(tree.starts_with(&format!(
            "root 0: {}",
            hex::encode(Cell::empty().repr_hash())
        )));

        let json = render(&["boc", "decode", hex, "--json"]);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["roots"][0], 0);
        assert_eq!(value["cells"][0]["bits"], 0);
        assert_eq!(value["cells"][0]["data"], "");
    }

    #[test]
    fn test_json_report_lists_shared_cells_once() {
        let mut cell = Cell::empty();
        for i in 0..30u8 {
            let mut builder = CellBuilder::new();
            builder.store_byte(i).unwrap();
            builder.store_ref(cell.clone()).unwrap();
            builder.store_ref(cell).unwrap();
            cell = builder.build().unwrap();
        }
        let hex = crate::tvm::boc::boc_to_hex(&cell, false).unwrap();

        let json = render(&["boc", "decode", &hex, "--json"]);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let cells = value["cells"].as_array().unwrap();
        assert_eq!(cells.len(), 31);
        assert_eq!(cells[0]["references"], serde_json::json!([1, 1]));
        assert_eq!(cells[0]["hash"], hex::encode(cell.repr_hash()));

        let tree = render(&["boc", "decode", &hex]);
        assert_eq!(tree.lines().count(), 62);
    }

    #[test]
    fn test_garbage_input_is_an_error() {
        let cli = Cli::try_parse_from(["ton-codec", "boc", "decode", "not a boc!"]).unwrap();
        assert!(cli.render().is_err());
    }
}
