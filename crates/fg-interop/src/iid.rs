//! Interface identifiers the facade answers for.

/// A COM interface identifier, laid out as the `u128` form of the GUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid(pub u128);

pub const IUNKNOWN: Guid = Guid(0x00000000_0000_0000_c000_000000000046);
pub const IDXGI_OBJECT: Guid = Guid(0xaec22fb8_76f3_4639_9be0_28eb43a67a2e);
pub const IDXGI_DEVICE_SUB_OBJECT: Guid = Guid(0x3d3e0379_f9de_4d58_bb6c_18d62992f1a6);
pub const IDXGI_SWAP_CHAIN: Guid = Guid(0x310d36a0_d2e7_4c0a_aa04_6a9d23b8886a);
pub const IDXGI_SWAP_CHAIN1: Guid = Guid(0x790a45f7_0d42_4876_983a_0a55cfe6f4aa);
pub const IDXGI_SWAP_CHAIN2: Guid = Guid(0xa8be2ac4_199f_4946_b331_79599fb98de7);
pub const IDXGI_SWAP_CHAIN3: Guid = Guid(0x94d99bdb_f1f8_4ab0_b236_7da0170edab1);
pub const IDXGI_SWAP_CHAIN4: Guid = Guid(0x3d585d5a_bd4a_489e_b1f4_3dbcb6452ffb);

pub const ID3D11_DEVICE: Guid = Guid(0xdb6f6ddb_ac77_4e88_8253_819df9bbf140);
pub const ID3D11_DEVICE1: Guid = Guid(0xa04bfb29_08ef_43d6_a49c_a9bdbdcbe686);
pub const ID3D11_DEVICE2: Guid = Guid(0x9d06dffa_d1e5_4d07_83a8_1bb123f2f841);
pub const ID3D11_DEVICE3: Guid = Guid(0xa05c8c37_d2c6_4732_b3a0_9ce0b0dc9ae6);
pub const ID3D11_DEVICE4: Guid = Guid(0x8992ab71_02e6_4b8d_ba48_b056dcda42c4);
pub const ID3D11_DEVICE5: Guid = Guid(0x8ffde202_a0e7_45df_9e01_e837801b5ea0);

/// Interfaces the facade returns itself for. Hosts and effect layers that
/// cache a queried pointer keep calling through the facade.
pub const SWAP_CHAIN_FAMILY: [Guid; 8] = [
    IUNKNOWN,
    IDXGI_OBJECT,
    IDXGI_DEVICE_SUB_OBJECT,
    IDXGI_SWAP_CHAIN,
    IDXGI_SWAP_CHAIN1,
    IDXGI_SWAP_CHAIN2,
    IDXGI_SWAP_CHAIN3,
    IDXGI_SWAP_CHAIN4,
];

/// API-A device interfaces `GetDevice` answers with the bridged device.
pub const API_A_DEVICES: [Guid; 6] = [
    ID3D11_DEVICE,
    ID3D11_DEVICE1,
    ID3D11_DEVICE2,
    ID3D11_DEVICE3,
    ID3D11_DEVICE4,
    ID3D11_DEVICE5,
];

pub fn is_swap_chain_family(iid: &Guid) -> bool {
    SWAP_CHAIN_FAMILY.contains(iid)
}

pub fn is_api_a_device(iid: &Guid) -> bool {
    API_A_DEVICES.contains(iid)
}
