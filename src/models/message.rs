//! Messages and their headers

use crate::models::address::MsgAddress;
use crate::models::currency::{Coins, CurrencyCollection};
use crate::models::state_init::StateInit;
use crate::models::traits::{TLB, read_either, read_remaining, write_either};
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::{ArcCell, Cell, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::tvm::error::Result;
use crate::tvm::slice::CellSlice;

/// `int_msg_info$0`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntMsgInfo {
    pub ihr_disabled: bool,
    pub bounce: bool,
    pub bounced: bool,
    pub src: MsgAddress,
    pub dest: MsgAddress,
    pub value: CurrencyCollection,
    pub ihr_fee: Coins,
    pub fwd_fee: Coins,
    pub created_lt: u64,
    pub created_at: u32,
}

/// `ext_in_msg_info$10`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtInMsgInfo {
    pub src: MsgAddress,
    pub dest: MsgAddress,
    pub import_fee: Coins,
}

/// `ext_out_msg_info$11`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtOutMsgInfo {
    pub src: MsgAddress,
    pub dest: MsgAddress,
    pub created_lt: u64,
    pub created_at: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonMsgInfo {
    Int(IntMsgInfo),
    ExtIn(ExtInMsgInfo),
    ExtOut(ExtOutMsgInfo),
}

impl CommonMsgInfo {
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    pub fn dest(&self) -> &MsgAddress {
        match self {
            Self::Int(info) => &info.dest,
            Self::ExtIn(info) => &info.dest,
            Self::ExtOut(info) => &info.dest,
        }
    }
}

impl TLB for CommonMsgInfo {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        if !slice.load_bit()? {
            return Ok(Self::Int(IntMsgInfo {
                ihr_disabled: slice.load_bit()?,
                bounce: slice.load_bit()?,
                bounced: slice.load_bit()?,
                // outgoing messages carry addr_none until the node fills in the sender
                src: MsgAddress::read(slice)?,
                dest: MsgAddress::read(slice)?.expect_internal("dest")?,
                value: CurrencyCollection::read(slice)?,
                ihr_fee: Coins::read(slice)?,
                fwd_fee: Coins::read(slice)?,
                created_lt: slice.load_u64()?,
                created_at: slice.load_u32()?,
            }));
        }

        if !slice.load_bit()? {
            Ok(Self::ExtIn(ExtInMsgInfo {
                src: MsgAddress::read(slice)?.expect_external("src")?,
                dest: MsgAddress::read(slice)?.expect_internal("dest")?,
                import_fee: Coins::read(slice)?,
            }))
        } else {
            Ok(Self::ExtOut(ExtOutMsgInfo {
                src: MsgAddress::read(slice)?,
                dest: MsgAddress::read(slice)?.expect_external("dest")?,
                created_lt: slice.load_u64()?,
                created_at: slice.load_u32()?,
            }))
        }
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        match self {
            Self::Int(info) => {
                builder.store_bit(false)?;
                builder.store_bit(info.ihr_disabled)?;
                builder.store_bit(info.bounce)?;
                builder.store_bit(info.bounced)?;
                info.src.write(builder)?;
                info.dest.clone().expect_internal("dest")?.write(builder)?;
                info.value.write(builder)?;
                info.ihr_fee.write(builder)?;
                info.fwd_fee.write(builder)?;
                builder.store_u64(info.created_lt)?;
                builder.store_u32(info.created_at)?;
            }
            Self::ExtIn(info) => {
                builder.store_uint(0b10, 2)?;
                info.src.clone().expect_external("src")?.write(builder)?;
                info.dest.clone().expect_internal("dest")?.write(builder)?;
                info.import_fee.write(builder)?;
            }
            Self::ExtOut(info) => {
                builder.store_uint(0b11, 2)?;
                info.src.write(builder)?;
                info.dest.clone().expect_external("dest")?.write(builder)?;
                builder.store_u64(info.created_lt)?;
                builder.store_u32(info.created_at)?;
            }
        }
        Ok(())
    }
}

/// Where the optional state init and the body are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageLayout {
    pub init_to_cell: bool,
    pub body_to_cell: bool,
}

/// Message body as the cell-encoded `X` of `Message X`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body(pub ArcCell);

impl TLB for Body {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self(read_remaining(slice)?))
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_cell(&self.0)?;
        Ok(())
    }

    fn read_ref(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self(slice.load_ref()?))
    }

    fn write_ref(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_ref(self.0.clone())?;
        Ok(())
    }
}

/// ```text
/// message$_ {X:Type} info:CommonMsgInfo
///   init:(Maybe (Either StateInit ^StateInit))
///   body:(Either X ^X) = Message X;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub info: CommonMsgInfo,
    pub init: Option<StateInit>,
    pub body: ArcCell,
    /// Placement read from the wire; computed on write when absent
    pub layout: Option<MessageLayout>,
}

impl Message {
    pub fn new(info: CommonMsgInfo, body: ArcCell) -> Self {
        Self {
            info,
            init: None,
            body,
            layout: None,
        }
    }

    pub fn with_init(mut self, init: StateInit) -> Self {
        self.init = Some(init);
        self.layout = None;
        self
    }

    /// Keeps the init and body inline while they fit. The body gets the
    /// first claim on the remaining space.
    pub fn compute_layout(&self) -> Result<MessageLayout> {
        let mut header = CellBuilder::new();
        self.info.write(&mut header)?;
        // init presence bit and body placement bit
        let (mut bits, mut refs) = (header.bit_len() + 2, header.ref_count());

        let (init_bits, init_refs) = match &self.init {
            Some(init) => {
                let mut builder = CellBuilder::new();
                init.write(&mut builder)?;
                bits += 1;
                (builder.bit_len(), builder.ref_count())
            }
            None => (0, 0),
        };
        let body = (self.body.bit_len(), self.body.reference_count());

        let fits = |bits: usize, refs: usize| bits <= MAX_CELL_BITS && refs <= MAX_CELL_REFS;

        let mut layout = MessageLayout::default();
        if fits(bits + body.0, refs + body.1) {
            bits += body.0;
            refs += body.1;
        } else {
            layout.body_to_cell = true;
            refs += 1;
        }
        if self.init.is_some() && !fits(bits + init_bits, refs + init_refs) {
            layout.init_to_cell = true;
            if !fits(bits, refs + 1) {
                layout.body_to_cell = true;
            }
        }
        Ok(layout)
    }
}

impl TLB for Message {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        let info = CommonMsgInfo::read(slice)?;
        let (init, init_to_cell) = if slice.load_bit()? {
            let (init, to_cell) = read_either::<StateInit>(slice)?;
            (Some(init), to_cell)
        } else {
            (None, false)
        };
        let (body, body_to_cell) = read_either::<Body>(slice)?;

        Ok(Self {
            info,
            init,
            body: body.0,
            layout: Some(MessageLayout {
                init_to_cell,
                body_to_cell,
            }),
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        let layout = match self.layout {
            Some(layout) => layout,
            None => self.compute_layout()?,
        };
        self.info.write(builder)?;
        match &self.init {
            Some(init) => {
                builder.store_bit(true)?;
                write_either(init, layout.init_to_cell, builder)?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }
        write_either(&Body(self.body.clone()), layout.body_to_cell, builder)
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new(CommonMsgInfo::ExtIn(ExtInMsgInfo::default()), Cell::empty())
    }
}
