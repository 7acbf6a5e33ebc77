pub mod mock_fabric_peer;
pub mod mock_stream_server;

pub use mock_fabric_peer::{FabricHandle, MockFabricPeer, ScriptedResponse};
pub use mock_stream_server::{MockStreamServer, StreamScript};
