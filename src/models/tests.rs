use super::*;
use crate::tvm::address::Address;
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::{ArcCell, Cell};
use crate::tvm::dict::Dict;
use crate::tvm::exotic::{merkle_proof, merkle_proof_root_hash};
use ed25519_dalek::SigningKey;
use std::collections::HashSet;

fn wallet_state() -> StateInit {
    let mut code = CellBuilder::new();
    code.store_u32(0xFF00_F4A4).unwrap();
    let mut data = CellBuilder::new();
    data.store_u32(0).unwrap();
    data.store_u32(698_983_191).unwrap();
    data.store_bytes(&[0x11; 32]).unwrap();
    StateInit::new(code.build().unwrap(), data.build().unwrap())
}

fn signed_transfer(key: &SigningKey) -> SignedBody {
    let mut payload = CellBuilder::new();
    payload.store_u32(698_983_191).unwrap();
    payload.store_u32(u32::MAX).unwrap();
    payload.store_u32(0).unwrap();
    SignedBody::sign(key, payload.build().unwrap(), None)
}

fn external_deploy(key: &SigningKey) -> Message {
    let state = wallet_state();
    let info = CommonMsgInfo::ExtIn(ExtInMsgInfo {
        src: MsgAddress::None,
        dest: MsgAddress::from(state.address(0).unwrap()),
        import_fee: Coins::ZERO,
    });
    let body = signed_transfer(key).to_cell().unwrap();
    Message::new(info, body).with_init(state)
}

fn storage_only_transaction(in_msg: ArcCell) -> Transaction {
    Transaction {
        account_addr: wallet_state().address(0).unwrap().hash_part,
        lt: 1_000,
        prev_trans_hash: [0; 32],
        prev_trans_lt: 0,
        now: 1_700_000_000,
        outmsg_cnt: 0,
        orig_status: AccountStatus::Uninit,
        end_status: AccountStatus::Active,
        in_msg: Some(in_msg),
        out_msgs: Dict::new(15),
        total_fees: CurrencyCollection::new(10_000u64),
        state_update: HashUpdate {
            old_hash: [0xAA; 32],
            new_hash: [0xBB; 32],
        },
        description: TransactionDescr::Storage(StoragePhase {
            storage_fees_collected: Coins(10_000),
            storage_fees_due: None,
            status_change: AccountStatusChange::Unchanged,
        }),
    }
}

#[test]
fn test_encoding_is_deterministic() {
    let key = SigningKey::from_bytes(&[1; 32]);
    let first = external_deploy(&key).to_cell().unwrap();
    let second = external_deploy(&key).to_cell().unwrap();
    assert_eq!(first.repr_hash(), second.repr_hash());
    assert_eq!(
        external_deploy(&key).to_boc(true).unwrap(),
        external_deploy(&key).to_boc(true).unwrap()
    );
}

#[test]
fn test_signed_deploy_survives_boc() {
    let key = SigningKey::from_bytes(&[2; 32]);
    let message = external_deploy(&key);
    let boc = message.to_boc(true).unwrap();

    let decoded = Message::from_boc(&boc).unwrap();
    assert_eq!(decoded.init, message.init);
    let body = SignedBody::from_cell(&decoded.body).unwrap();
    assert!(body.verify(&key.verifying_key(), None));

    let dest = decoded.info.dest().to_address().unwrap();
    assert_eq!(dest, wallet_state().address(0).unwrap());
}

#[test]
fn test_message_inside_transaction() {
    let key = SigningKey::from_bytes(&[3; 32]);
    let message = external_deploy(&key);
    let transaction = storage_only_transaction(message.to_cell().unwrap());

    let boc = transaction.to_boc(false).unwrap();
    let decoded = Transaction::from_boc(&boc).unwrap();
    assert_eq!(decoded, transaction);

    let in_msg = decoded.in_message().unwrap().unwrap();
    assert_eq!(in_msg.cell_hash().unwrap(), message.cell_hash().unwrap());
    assert!(decoded.out_messages().unwrap().is_empty());
}

#[test]
fn test_shared_cells_are_deduplicated() {
    // the same state appears in the message init and in the account
    let state = wallet_state();
    let account = Account::Existing {
        address: MsgAddress::from(state.address(0).unwrap()),
        storage_stat: StorageInfo::default(),
        storage: AccountStorage {
            last_trans_lt: 1_000,
            balance: CurrencyCollection::new(5u64),
            state: AccountState::Active(state.clone()),
        },
    };
    let account_cell = account.to_cell().unwrap();

    let mut builder = CellBuilder::new();
    builder.store_ref(account_cell.clone()).unwrap();
    builder.store_ref(state.to_cell().unwrap()).unwrap();
    let root = builder.build().unwrap();

    let mut hashes = HashSet::new();
    collect(&root, &mut hashes);
    let boc = crate::tvm::boc::serialize_boc(&root, false).unwrap();
    // cell count in the header (1-byte size field)
    assert_eq!(boc[6] as usize, hashes.len());
}

fn collect(cell: &ArcCell, hashes: &mut HashSet<[u8; 32]>) {
    if hashes.insert(cell.repr_hash()) {
        for child in cell.references() {
            collect(child, hashes);
        }
    }
}

#[test]
fn test_proof_of_account_state() {
    let state = wallet_state();
    let shard_account = ShardAccount {
        account: Account::Existing {
            address: MsgAddress::from(state.address(-1).unwrap()),
            storage_stat: StorageInfo::default(),
            storage: AccountStorage {
                last_trans_lt: 7,
                balance: CurrencyCollection::new(1u64),
                state: AccountState::Active(state),
            },
        },
        last_trans_hash: [4; 32],
        last_trans_lt: 7,
    };
    let root = shard_account.to_cell().unwrap();
    let account_cell = root.references()[0].clone();

    let mut keep = HashSet::new();
    keep.insert(root.repr_hash());
    keep.insert(account_cell.repr_hash());
    let proof = merkle_proof(&root, &keep).unwrap();
    assert_eq!(merkle_proof_root_hash(&proof).unwrap(), root.repr_hash());

    // the kept account is still readable through the proof
    let inner = proof.references()[0].clone();
    let account = Account::from_cell(&inner.references()[0]).unwrap();
    assert_eq!(account.status(), AccountStatus::Active);
}

#[test]
fn test_empty_body_message_hash_is_stable() {
    let message = Message::new(
        CommonMsgInfo::Int(IntMsgInfo {
            dest: MsgAddress::from(Address::new(0, [0; 32])),
            ..Default::default()
        }),
        Cell::empty(),
    );
    let cell = message.to_cell().unwrap();
    let decoded = Message::from_cell(&cell).unwrap();
    assert_eq!(decoded.cell_hash().unwrap(), cell.repr_hash());
}
