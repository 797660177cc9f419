pub struct OperationMessages {
    pub starting: &'static str,
    pub success: &'static str,
    pub failed: &'static str,
}

pub struct WorkspaceOperations {
    pub create: OperationMessages,
    pub start: OperationMessages,
    pub stop: OperationMessages,
    pub destroy: OperationMessages,
}

pub const WORKSPACE_OPS: WorkspaceOperations = WorkspaceOperations {
    create: OperationMessages {
        starting: "Creating workspace '{name}'...",
        success: "Workspace '{name}' created",
        failed: "Failed to create workspace '{name}'",
    },
    start: OperationMessages {
        starting: "Starting workspace '{name}'...",
        success: "Workspace '{name}' started",
        failed: "Failed to start workspace '{name}'",
    },
    stop: OperationMessages {
        starting: "Stopping workspace '{name}'...",
        success: "Workspace '{name}' stopped",
        failed: "Failed to stop workspace '{name}'",
    },
    destroy: OperationMessages {
        starting: "Destroying workspace '{name}'...",
        success: "Workspace '{name}' destroyed",
        failed: "Failed to destroy workspace '{name}'",
    },
};
