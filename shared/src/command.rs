use tether_serde::serde_enum;

serde_enum! {
    /// Opcode that starts every frame
    pub enum Command {
        Create = 0x0001,
        UpdateValue = 0x0002,
        Delete = 0x0003,
        SetClientId = 0x0004,
        SetGameSpeed = 0x0005,
        ClientCommand = 0x0006,
        ServerCommand = 0x0007,
        Alive = 0x0008,
        AliveResp = 0x0009,
        RequestAuth = 0x000A,
        ClientSendAuth = 0x000B,
        NewProxyClient = 0x000C,
        SetProxyClientId = 0x000D,
        DelProxyClient = 0x000E,
        ProxyClientCommand = 0x000F,
        ProxyToClients = 0x0010,
        ServerConnectToProxy = 0x0011,
        AudioCommStart = 0x0012,
        AudioCommData = 0x0013,
        AudioCommStop = 0x0014,
        EcsSetComponent = 0x0015,
        EcsDelComponent = 0x0016,
        EcsDestroyEntity = 0x0017,
        ProxyClientRejected = 0x0018,
        ProxyClientAudio = 0x0019,
    }
}

impl Command {
    /// Commands a proxy relays from its upstream to every committed
    /// downstream connection
    pub fn is_broadcast(&self) -> bool {
        matches!(
            self,
            Command::Create
                | Command::UpdateValue
                | Command::Delete
                | Command::SetGameSpeed
                | Command::ServerCommand
                | Command::EcsSetComponent
                | Command::EcsDelComponent
                | Command::EcsDestroyEntity
        )
    }

    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            Command::AudioCommStart | Command::AudioCommData | Command::AudioCommStop
        )
    }
}
