//! Protocol contract interfaces.
//!
//! Generated call/event types for the vault factory, vault, liquidation
//! manager, oracle, and the Multicall3 aggregator used by the batched
//! read path.

alloy::sol! {
    interface IVaultFactory {
        event VaultCreated(address indexed vault, address indexed owner);
    }

    interface IVault {
        function collateralAmount() external view returns (uint256);
        function debtAmount() external view returns (uint256);
        function collateralToken() external view returns (address);
    }

    interface ILiquidationManager {
        function vaultToAuctionId(address vault) external view returns (uint256);
        function startAuction(address vault) external;
    }

    interface IPriceOracle {
        function getPrice(address token) external view returns (uint256);
    }

    struct Multicall3Call {
        address target;
        bool allowFailure;
        bytes callData;
    }

    struct Multicall3Result {
        bool success;
        bytes returnData;
    }

    function aggregate3(Multicall3Call[] calldata calls)
        external
        payable
        returns (Multicall3Result[] memory returnData);
}
