//! Definitions of Solidity functions called during deployment

use alloy::sol;

sol! {
    /// The buyback pool
    interface IPerpBuybackPool {
        function initialize(address usdc, address perp, address perpUsdChainlinkAggregator) external;
        function getPerpBuyback() external view returns (address);
        function setPerpBuyback(address perpBuyback) external;
    }
}

sol! {
    /// The buyback controller
    interface IPerpBuyback {
        function initialize(address usdc, address perp, address vePerp, address perpBuybackPool) external;
    }
}

sol! {
    /// Two-phase ownership, as implemented by the buyback contracts
    interface ISafeOwnable {
        function owner() external view returns (address);
        function pendingOwner() external view returns (address);
        function transferOwnership(address newOwner) external;
        function acceptOwnership() external;
    }
}

sol! {
    /// The OpenZeppelin proxy admin, which transfers ownership in a single phase
    interface IProxyAdmin {
        function owner() external view returns (address);
        function transferOwnership(address newOwner) external;
        function upgrade(address proxy, address implementation) external;
    }
}
